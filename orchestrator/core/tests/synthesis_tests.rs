// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde_json::Value as Json;
use std::collections::BTreeSet;

use studio_infra_core::domain::compute::Tenancy;
use studio_infra_core::domain::deployment_config::DeploymentSpec;
use studio_infra_core::{assemble, CloudAssembly, Synthesizer};

fn synthesize(svn: bool) -> CloudAssembly {
    let mut spec = DeploymentSpec::default();
    spec.access.allow_prefix_lists = vec!["pl-0123456789abcdef0".to_string()];
    spec.version_control.svn = svn;
    let deployment = assemble(&spec).unwrap();
    Synthesizer::new().synthesize(&deployment).unwrap()
}

fn collect_imports(value: &Json, out: &mut BTreeSet<String>) {
    match value {
        Json::Object(map) => {
            if let Some(Json::String(name)) = map.get("Fn::ImportValue") {
                out.insert(name.clone());
            }
            map.values().for_each(|v| collect_imports(v, out));
        }
        Json::Array(items) => items.iter().for_each(|v| collect_imports(v, out)),
        _ => {}
    }
}

fn resources_of_type<'a>(template: &'a Json, kind: &str) -> Vec<&'a Json> {
    template["Resources"]
        .as_object()
        .map(|r| r.values().filter(|v| v["Type"] == kind).collect())
        .unwrap_or_default()
}

#[test]
fn test_stack_order_and_dependencies() {
    let assembly = synthesize(false);
    let names: Vec<_> = assembly.stacks.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names[0], "SetupStack");
    assert_eq!(names.len(), 5);

    let position = |n: &str| names.iter().position(|s| *s == n).unwrap();
    assert!(position("BuildNodeStack") < position("CICDStack"));

    let ci = assembly.stack("CICDStack").unwrap();
    assert_eq!(ci.dependencies, vec!["SetupStack", "BuildNodeStack"]);
    assert_eq!(assembly.stack("WorkstationStack").unwrap().dependencies, vec!["SetupStack"]);
    assert!(assembly.stack("SetupStack").unwrap().dependencies.is_empty());
}

#[test]
fn test_every_import_has_a_matching_export() {
    let assembly = synthesize(true);

    let exported: BTreeSet<String> = assembly
        .stacks
        .iter()
        .flat_map(|s| s.export_names())
        .map(str::to_string)
        .collect();

    let mut imported = BTreeSet::new();
    for stack in &assembly.stacks {
        collect_imports(&stack.template, &mut imported);
    }

    assert!(!imported.is_empty());
    for name in &imported {
        assert!(exported.contains(name), "import {} has no export", name);
    }
}

#[test]
fn test_directory_resolvers_are_exported_by_name() {
    let assembly = synthesize(false);
    let setup = assembly.stack("SetupStack").unwrap();
    let exports = setup.export_names();
    assert!(exports.contains(&"StudioADDNS1"));
    assert!(exports.contains(&"StudioADDNS2"));
}

#[test]
fn test_host_scripts_are_base64_user_data() {
    let assembly = synthesize(false);
    let vcs = &assembly.stack("VCSStack").unwrap().template;

    let instances = resources_of_type(vcs, "AWS::EC2::Instance");
    assert_eq!(instances.len(), 1);
    assert!(instances[0]["Properties"]["UserData"]["Fn::Base64"].is_object());

    let workstation = &assembly.stack("WorkstationStack").unwrap().template;
    let templates = resources_of_type(workstation, "AWS::EC2::LaunchTemplate");
    assert_eq!(templates.len(), 1);
    assert!(templates[0]["Properties"]["LaunchTemplateData"]["UserData"]["Fn::Base64"].is_object());
}

#[test]
fn test_build_workers_launch_on_dedicated_hardware() {
    let assembly = synthesize(false);

    let build_node = &assembly.stack("BuildNodeStack").unwrap().template;
    let workers = resources_of_type(build_node, "AWS::EC2::LaunchTemplate");
    assert_eq!(workers.len(), 1);
    assert_eq!(
        workers[0]["Properties"]["LaunchTemplateData"]["Placement"]["Tenancy"],
        "dedicated"
    );

    let workstation = &assembly.stack("WorkstationStack").unwrap().template;
    let templates = resources_of_type(workstation, "AWS::EC2::LaunchTemplate");
    assert!(templates[0]["Properties"]["LaunchTemplateData"].get("Placement").is_none());
}

#[test]
fn test_worker_tenancy_follows_configuration() {
    let mut spec = DeploymentSpec::default();
    spec.build_worker.tenancy = Tenancy::Default;
    let deployment = assemble(&spec).unwrap();
    let assembly = Synthesizer::new().synthesize(&deployment).unwrap();

    let build_node = &assembly.stack("BuildNodeStack").unwrap().template;
    let workers = resources_of_type(build_node, "AWS::EC2::LaunchTemplate");
    assert!(workers[0]["Properties"]["LaunchTemplateData"].get("Placement").is_none());
}

#[test]
fn test_records_point_at_host_addresses() {
    let assembly = synthesize(true);
    let vcs = &assembly.stack("VCSStack").unwrap().template;

    let records = resources_of_type(vcs, "AWS::Route53::RecordSet");
    let names: BTreeSet<_> = records.iter().filter_map(|r| r["Properties"]["Name"].as_str()).collect();
    assert_eq!(
        names,
        BTreeSet::from(["perforce.gamestudio.aws.internal.", "svn.gamestudio.aws.internal."])
    );
    for record in records {
        assert_eq!(record["Properties"]["TTL"], "300");
        assert!(record["DependsOn"].as_array().is_some_and(|d| d.len() == 1));
        // zone lives in the setup stack
        assert!(record["Properties"]["HostedZoneId"]["Fn::ImportValue"].is_string());
    }
}

#[test]
fn test_write_to_directory() {
    let assembly = synthesize(false);
    let dir = tempfile::tempdir().unwrap();

    let written = assembly.write_to(dir.path()).unwrap();
    assert_eq!(written.len(), 6);

    let manifest: Json =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("manifest.json")).unwrap()).unwrap();
    let files: Vec<_> = manifest["stacks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["templateFile"].as_str().unwrap().to_string())
        .collect();
    for file in files {
        let template: Json = serde_json::from_str(&std::fs::read_to_string(dir.path().join(&file)).unwrap()).unwrap();
        assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    }
}
