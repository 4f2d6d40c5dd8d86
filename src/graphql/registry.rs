//! Query Registry - embedded GraphQL documents
//!
//! Every document under `queries/` is compiled into the binary and parsed
//! once on first access. Documents are keyed by name without their
//! `query_`/`mutation_` prefix.

use super::document::GraphQlDocument;
use crate::error::{PolarisError, Result};
use std::collections::HashMap;
use std::sync::OnceLock;

macro_rules! documents {
    ($($kind:ident $name:ident,)*) => {
        &[$(
            (
                stringify!($name),
                include_str!(concat!("queries/", stringify!($kind), "_", stringify!($name), ".graphql")),
            ),
        )*]
    };
}

/// Embedded documents (compiled into the binary)
const DOCUMENTS: &[(&str, &str)] = documents! {
    mutation accounts_aws_add_commit,
    mutation accounts_aws_add_initiate,
    mutation accounts_aws_delete_commit,
    mutation accounts_aws_delete_initiate,
    mutation accounts_aws_disable,
    mutation accounts_aws_update_initiate,
    mutation accounts_gcp_default_sa_set,
    mutation accounts_gcp_project_add,
    mutation accounts_gcp_project_delete,
    mutation accounts_gcp_project_disable,
    mutation compute_export_ec2,
    mutation compute_restore_azure,
    mutation compute_restore_ec2,
    mutation compute_restore_gce,
    mutation core_sla_assign,
    mutation core_snappable_on_demand,
    mutation gps_file_download,
    mutation gps_vm_export,
    mutation gps_vm_files_recover,
    mutation gps_vm_livemount,
    mutation gps_vm_snapshot_create,
    mutation k8s_add,
    mutation k8s_refresh,
    mutation radar_ioc_scan,
    mutation sonar_csv_download,
    mutation sonar_on_demand_scan,
    mutation sonar_on_demand_scan_result,
    query accounts_aws,
    query accounts_aws_detail,
    query accounts_azure,
    query accounts_gcp,
    query accounts_gcp_default_sa_get,
    query accounts_gcp_permissions,
    query accounts_gcp_projects,
    query appflows_blueprints_list,
    query cdm_cluster_connection_status,
    query cdm_cluster_ipaddr,
    query cdm_cluster_location,
    query compute_aws_ec2,
    query compute_aws_ec2_detail,
    query compute_aws_region_kmskeys,
    query compute_aws_region_sshkeypairs,
    query compute_aws_region_vpcs,
    query compute_azure_iaas,
    query compute_gcp_gce,
    query compute_vmware_vsphere,
    query compute_vmware_vsphere_detail,
    query core_event_series_list,
    query core_polaris_version,
    query core_report_data,
    query core_sla_list,
    query core_snappable_snapshot,
    query core_snappable_snapshots,
    query core_taskchain_status,
    query gps_async_request_result,
    query gps_clusters,
    query gps_sla_domain,
    query gps_snapshot_files,
    query gps_vm_datastores,
    query gps_vm_hosts,
    query graphql_enum_values,
    query k8s_list,
    query k8s_namespace,
    query k8s_namespaces,
    query k8s_status,
    query polaris_object_list,
    query polaris_object_search,
    query polaris_object_snapshot,
    query polaris_vm_object_list,
    query polaris_vm_object_metadata,
    query polaris_vm_object_snapshot,
    query radar_analysis_status,
    query radar_anomaly_csv_analysis,
    query radar_ioc_scan_list,
    query radar_ioc_scan_result,
    query sonar_csv_result_download,
    query sonar_on_demand_scan_status,
    query sonar_policies,
    query sonar_policy_analyzer_groups,
    query sonar_sensitive_hits_object_detail,
    query sonar_sensitive_hits_object_list,
    query storage_aws_ebs,
};

/// Global registry of parsed documents
static REGISTRY: OnceLock<HashMap<&'static str, GraphQlDocument>> = OnceLock::new();

fn registry() -> &'static HashMap<&'static str, GraphQlDocument> {
    REGISTRY.get_or_init(|| {
        DOCUMENTS
            .iter()
            .map(|(name, text)| {
                let document = GraphQlDocument::parse(name, text)
                    .unwrap_or_else(|e| panic!("Failed to parse embedded GraphQL document: {}", e));
                (*name, document)
            })
            .collect()
    })
}

/// Look up a document by name
pub fn get_document(name: &str) -> Result<&'static GraphQlDocument> {
    registry()
        .get(name)
        .ok_or_else(|| PolarisError::UnknownQuery(name.to_string()))
}

/// All registered names, sorted
pub fn query_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = registry().keys().copied().collect();
    names.sort_unstable();
    names
}
