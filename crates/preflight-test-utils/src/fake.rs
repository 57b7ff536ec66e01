//! In-memory cloud
//!
//! [`FakeCloud`] implements every provider trait against shared in-memory
//! state and records each call, so tests can assert on exactly which
//! mutations were issued and in what order. Deletes enforce the same
//! preconditions the real services do (a certificate in use cannot be
//! deleted, a distribution must be disabled and deployed first).

use anyhow::Result;
use preflight::aws::error::AwsError;
use preflight::aws::models::{
    AuthDomainInfo, CertificateDetail, CertificateSummary, DISTRIBUTION_DEPLOYED,
    DistributionEdit, DistributionInfo, DnsRecord, EdgeIdentityInfo, GraphApiInfo,
    GraphDomainInfo, HostedZone, StackResource, TableInfo, UserPoolInfo, same_domain,
};
use preflight::aws::{
    AuthOperations, BucketOperations, CdnOperations, CertificateOperations, CloudApi,
    DnsOperations, GraphOperations, StackOperations, TableOperations,
};
use preflight_common::ResourceKind;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Status of a distribution whose last change is still propagating
const IN_PROGRESS: &str = "InProgress";

/// Operations failures can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListCertificates,
    DeleteCertificate,
    ListRecords,
    DeleteRecord,
    DescribeAuthDomain,
    DeleteAuthDomain,
    ListDistributions,
    EditDistribution,
    DeleteDistribution,
    DeleteEdgeIdentity,
    GetGraphDomain,
    DisassociateApi,
    DeleteGraphDomain,
    DeleteGraphApi,
    DescribeTable,
    ListStackResources,
}

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeleteCertificate(String),
    DeleteRecord { zone_id: String, name: String },
    DeleteAuthDomain { domain: String, user_pool_id: String },
    EditDistribution { id: String, edit: DistributionEdit },
    /// Read of a distribution, with the state it was observed in
    GetDistribution { id: String, enabled: bool, deployed: bool },
    DeleteDistribution(String),
    DeleteEdgeIdentity(String),
    DisassociateApi(String),
    DeleteGraphDomain(String),
    DeleteGraphApi(String),
}

impl Call {
    /// Whether the call changes cloud state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::GetDistribution { .. })
    }

    /// Identifier of the resource the call targets
    pub fn target(&self) -> &str {
        match self {
            Call::DeleteCertificate(id)
            | Call::DeleteDistribution(id)
            | Call::DeleteEdgeIdentity(id)
            | Call::DisassociateApi(id)
            | Call::DeleteGraphDomain(id)
            | Call::DeleteGraphApi(id) => id,
            Call::DeleteRecord { name, .. } => name,
            Call::DeleteAuthDomain { domain, .. } => domain,
            Call::EditDistribution { id, .. } | Call::GetDistribution { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeDistribution {
    info: DistributionInfo,
    tags: HashMap<String, String>,
    /// Reads left before an in-progress change reports `Deployed`
    polls_left: u32,
}

#[derive(Debug, Default)]
struct State {
    certificates: Vec<(CertificateDetail, HashMap<String, String>)>,
    zones: Vec<HostedZone>,
    records: HashMap<String, Vec<DnsRecord>>,
    auth_domains: Vec<AuthDomainInfo>,
    user_pools: Vec<UserPoolInfo>,
    distributions: Vec<FakeDistribution>,
    edge_identities: Vec<EdgeIdentityInfo>,
    graph_apis: Vec<GraphApiInfo>,
    graph_domains: Vec<GraphDomainInfo>,
    tables: Vec<(TableInfo, HashMap<String, String>)>,
    buckets: Vec<(String, HashMap<String, String>)>,
    /// `None` until the stack exists
    stack: Option<Vec<StackResource>>,
    /// Reads a distribution change takes to deploy
    deploy_polls: u32,
    failures: HashMap<Op, VecDeque<AwsError>>,
    persistent_failures: HashMap<Op, AwsError>,
}

/// In-memory implementation of every provider trait
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<State>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn check(&self, op: Op) -> Result<()> {
        let mut state = self.state();
        if let Some(error) = state.persistent_failures.get(&op) {
            return Err(error.clone().into());
        }
        if let Some(error) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error.into());
        }
        Ok(())
    }

    // ---- setup ----

    pub fn add_certificate(&self, detail: CertificateDetail) {
        self.add_tagged_certificate(detail, HashMap::new());
    }

    pub fn add_tagged_certificate(&self, detail: CertificateDetail, tags: HashMap<String, String>) {
        self.state().certificates.push((detail, tags));
    }

    pub fn add_zone(&self, id: &str, name: &str) {
        self.state().zones.push(HostedZone {
            id: id.to_string(),
            name: format!("{}.", name.trim_end_matches('.')),
        });
    }

    pub fn add_record(&self, zone_id: &str, record: DnsRecord) {
        self.state()
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn add_auth_domain(&self, domain: AuthDomainInfo) {
        self.state().auth_domains.push(domain);
    }

    pub fn add_user_pool(&self, pool: UserPoolInfo) {
        self.state().user_pools.push(pool);
    }

    pub fn add_distribution(&self, info: DistributionInfo) {
        self.add_tagged_distribution(info, HashMap::new());
    }

    pub fn add_tagged_distribution(&self, info: DistributionInfo, tags: HashMap<String, String>) {
        self.state().distributions.push(FakeDistribution {
            info,
            tags,
            polls_left: 0,
        });
    }

    pub fn add_edge_identity(&self, identity: EdgeIdentityInfo) {
        self.state().edge_identities.push(identity);
    }

    pub fn add_graph_api(&self, api: GraphApiInfo) {
        self.state().graph_apis.push(api);
    }

    pub fn add_graph_domain(&self, domain: GraphDomainInfo) {
        self.state().graph_domains.push(domain);
    }

    pub fn add_table(&self, name: &str, tags: HashMap<String, String>) {
        let info = TableInfo {
            name: name.to_string(),
            arn: format!("arn:aws:dynamodb:us-east-1:123456789012:table/{name}"),
            created_at: None,
        };
        self.state().tables.push((info, tags));
    }

    pub fn add_bucket(&self, name: &str, tags: HashMap<String, String>) {
        self.state().buckets.push((name.to_string(), tags));
    }

    /// Create the stack if needed and list a resource in its inventory
    pub fn add_stack_resource(&self, kind: ResourceKind, physical_id: &str) {
        let mut state = self.state();
        let resources = state.stack.get_or_insert_with(Vec::new);
        let logical_id = format!("Logical{}", resources.len());
        resources.push(StackResource {
            resource_type: kind.cloudformation_type().to_string(),
            physical_id: physical_id.to_string(),
            logical_id,
        });
    }

    /// Number of reads an in-progress distribution change takes to deploy
    pub fn set_deploy_polls(&self, polls: u32) {
        self.state().deploy_polls = polls;
    }

    /// Fail the next call of `op` with `error`
    pub fn fail_next(&self, op: Op, error: AwsError) {
        self.state().failures.entry(op).or_default().push_back(error);
    }

    /// Fail every call of `op` with `error`
    pub fn fail_always(&self, op: Op, error: AwsError) {
        self.state().persistent_failures.insert(op, error);
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Mutations targeting `id`
    pub fn mutations_of(&self, id: &str) -> Vec<Call> {
        self.mutations()
            .into_iter()
            .filter(|call| call.target() == id)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn has_certificate(&self, arn: &str) -> bool {
        self.state().certificates.iter().any(|(c, _)| c.arn == arn)
    }

    pub fn has_record(&self, name: &str) -> bool {
        self.state()
            .records
            .values()
            .flatten()
            .any(|r| r.name == name)
    }

    pub fn has_distribution(&self, id: &str) -> bool {
        self.state().distributions.iter().any(|d| d.info.id == id)
    }

    pub fn has_edge_identity(&self, id: &str) -> bool {
        self.state().edge_identities.iter().any(|i| i.id == id)
    }

    pub fn has_auth_domain(&self, domain: &str) -> bool {
        self.state()
            .auth_domains
            .iter()
            .any(|d| same_domain(&d.domain, domain))
    }

    pub fn has_graph_api(&self, api_id: &str) -> bool {
        self.state().graph_apis.iter().any(|a| a.api_id == api_id)
    }

    pub fn has_graph_domain(&self, domain: &str) -> bool {
        self.state()
            .graph_domains
            .iter()
            .any(|d| same_domain(&d.domain_name, domain))
    }
}

fn not_found(resource_type: &'static str, id: &str) -> anyhow::Error {
    AwsError::NotFound {
        resource_type,
        resource_id: id.to_string(),
    }
    .into()
}

fn in_use(message: impl Into<String>) -> anyhow::Error {
    AwsError::InUse {
        message: message.into(),
    }
    .into()
}

impl CertificateOperations for FakeCloud {
    async fn list_certificates(&self) -> Result<Vec<CertificateSummary>> {
        self.check(Op::ListCertificates)?;
        Ok(self
            .state()
            .certificates
            .iter()
            .map(|(c, _)| CertificateSummary {
                arn: c.arn.clone(),
                domain_name: c.domain_name.clone(),
            })
            .collect())
    }

    async fn describe_certificate(&self, arn: &str) -> Result<Option<CertificateDetail>> {
        let state = self.state();
        let Some((detail, _)) = state.certificates.iter().find(|(c, _)| c.arn == arn) else {
            return Ok(None);
        };
        let mut detail = detail.clone();
        detail.in_use_by = state
            .distributions
            .iter()
            .filter(|d| d.info.certificate_arn.as_deref() == Some(arn))
            .map(|d| d.info.arn.clone())
            .collect();
        Ok(Some(detail))
    }

    async fn certificate_tags(&self, arn: &str) -> Result<HashMap<String, String>> {
        self.state()
            .certificates
            .iter()
            .find(|(c, _)| c.arn == arn)
            .map(|(_, tags)| tags.clone())
            .ok_or_else(|| not_found("certificate", arn))
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        self.record(Call::DeleteCertificate(arn.to_string()));
        self.check(Op::DeleteCertificate)?;
        let mut state = self.state();
        let used = state
            .distributions
            .iter()
            .any(|d| d.info.certificate_arn.as_deref() == Some(arn))
            || state
                .auth_domains
                .iter()
                .any(|d| d.certificate_arn.as_deref() == Some(arn))
            || state
                .graph_domains
                .iter()
                .any(|d| d.certificate_arn.as_deref() == Some(arn));
        if used {
            return Err(in_use(format!("Certificate {arn} is in use")));
        }
        state.certificates.retain(|(c, _)| c.arn != arn);
        Ok(())
    }
}

impl DnsOperations for FakeCloud {
    async fn find_hosted_zone(&self, domain: &str) -> Result<Option<HostedZone>> {
        Ok(self
            .state()
            .zones
            .iter()
            .find(|z| same_domain(&z.name, domain))
            .cloned())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        self.check(Op::ListRecords)?;
        Ok(self
            .state()
            .records
            .get(zone_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_record(&self, zone_id: &str, record: &DnsRecord) -> Result<()> {
        self.record(Call::DeleteRecord {
            zone_id: zone_id.to_string(),
            name: record.name.clone(),
        });
        self.check(Op::DeleteRecord)?;
        let mut state = self.state();
        let records = state.records.entry(zone_id.to_string()).or_default();
        let before = records.len();
        records.retain(|r| r != record);
        if records.len() == before {
            return Err(not_found("record", &record.name));
        }
        Ok(())
    }
}

impl AuthOperations for FakeCloud {
    async fn describe_domain(&self, domain: &str) -> Result<Option<AuthDomainInfo>> {
        self.check(Op::DescribeAuthDomain)?;
        Ok(self
            .state()
            .auth_domains
            .iter()
            .find(|d| same_domain(&d.domain, domain))
            .cloned())
    }

    async fn delete_domain(&self, domain: &str, user_pool_id: &str) -> Result<()> {
        self.record(Call::DeleteAuthDomain {
            domain: domain.to_string(),
            user_pool_id: user_pool_id.to_string(),
        });
        self.check(Op::DeleteAuthDomain)?;
        let mut state = self.state();
        let before = state.auth_domains.len();
        state
            .auth_domains
            .retain(|d| !(same_domain(&d.domain, domain) && d.user_pool_id == user_pool_id));
        if state.auth_domains.len() == before {
            return Err(not_found("auth domain", domain));
        }
        Ok(())
    }

    async fn list_user_pools(&self) -> Result<Vec<UserPoolInfo>> {
        // The listing carries no tags
        Ok(self
            .state()
            .user_pools
            .iter()
            .map(|p| UserPoolInfo {
                tags: HashMap::new(),
                ..p.clone()
            })
            .collect())
    }

    async fn describe_user_pool(&self, user_pool_id: &str) -> Result<Option<UserPoolInfo>> {
        Ok(self
            .state()
            .user_pools
            .iter()
            .find(|p| p.id == user_pool_id)
            .cloned())
    }
}

impl CdnOperations for FakeCloud {
    async fn list_distributions(&self) -> Result<Vec<DistributionInfo>> {
        self.check(Op::ListDistributions)?;
        Ok(self
            .state()
            .distributions
            .iter()
            .map(|d| d.info.clone())
            .collect())
    }

    async fn get_distribution(&self, id: &str) -> Result<Option<DistributionInfo>> {
        let observed = {
            let mut state = self.state();
            let Some(distribution) = state.distributions.iter_mut().find(|d| d.info.id == id)
            else {
                return Ok(None);
            };
            if !distribution.info.is_deployed() {
                if distribution.polls_left == 0 {
                    distribution.info.status = DISTRIBUTION_DEPLOYED.to_string();
                } else {
                    distribution.polls_left -= 1;
                }
            }
            distribution.info.clone()
        };
        self.record(Call::GetDistribution {
            id: id.to_string(),
            enabled: observed.enabled,
            deployed: observed.is_deployed(),
        });
        Ok(Some(observed))
    }

    async fn edit_distribution(&self, id: &str, edit: DistributionEdit) -> Result<()> {
        self.record(Call::EditDistribution {
            id: id.to_string(),
            edit,
        });
        self.check(Op::EditDistribution)?;
        let mut state = self.state();
        let polls = state.deploy_polls;
        let distribution = state
            .distributions
            .iter_mut()
            .find(|d| d.info.id == id)
            .ok_or_else(|| not_found("distribution", id))?;
        match edit {
            DistributionEdit::Disable => distribution.info.enabled = false,
            DistributionEdit::UseDefaultCertificate => {
                distribution.info.certificate_arn = None;
                distribution.info.aliases.clear();
            }
        }
        distribution.info.status = IN_PROGRESS.to_string();
        distribution.polls_left = polls;
        Ok(())
    }

    async fn delete_distribution(&self, id: &str) -> Result<()> {
        self.record(Call::DeleteDistribution(id.to_string()));
        self.check(Op::DeleteDistribution)?;
        let mut state = self.state();
        let distribution = state
            .distributions
            .iter()
            .find(|d| d.info.id == id)
            .ok_or_else(|| not_found("distribution", id))?;
        if distribution.info.enabled || !distribution.info.is_deployed() {
            return Err(in_use(format!("Distribution {id} is not disabled and deployed")));
        }
        state.distributions.retain(|d| d.info.id != id);
        Ok(())
    }

    async fn distribution_tags(&self, arn: &str) -> Result<HashMap<String, String>> {
        self.state()
            .distributions
            .iter()
            .find(|d| d.info.arn == arn)
            .map(|d| d.tags.clone())
            .ok_or_else(|| not_found("distribution", arn))
    }

    async fn list_edge_identities(&self) -> Result<Vec<EdgeIdentityInfo>> {
        Ok(self.state().edge_identities.clone())
    }

    async fn delete_edge_identity(&self, id: &str) -> Result<()> {
        self.record(Call::DeleteEdgeIdentity(id.to_string()));
        self.check(Op::DeleteEdgeIdentity)?;
        let mut state = self.state();
        if state
            .distributions
            .iter()
            .any(|d| d.info.edge_identity_ids.iter().any(|oai| oai == id))
        {
            return Err(in_use(format!("Origin access identity {id} is in use")));
        }
        let before = state.edge_identities.len();
        state.edge_identities.retain(|i| i.id != id);
        if state.edge_identities.len() == before {
            return Err(not_found("edge identity", id));
        }
        Ok(())
    }
}

impl GraphOperations for FakeCloud {
    async fn list_graph_apis(&self) -> Result<Vec<GraphApiInfo>> {
        Ok(self.state().graph_apis.clone())
    }

    async fn get_domain_name(&self, domain: &str) -> Result<Option<GraphDomainInfo>> {
        self.check(Op::GetGraphDomain)?;
        Ok(self
            .state()
            .graph_domains
            .iter()
            .find(|d| same_domain(&d.domain_name, domain))
            .cloned())
    }

    async fn disassociate_api(&self, domain: &str) -> Result<()> {
        self.record(Call::DisassociateApi(domain.to_string()));
        self.check(Op::DisassociateApi)?;
        let mut state = self.state();
        let binding = state
            .graph_domains
            .iter_mut()
            .find(|d| same_domain(&d.domain_name, domain))
            .ok_or_else(|| not_found("domain name", domain))?;
        binding.associated_api_id = None;
        Ok(())
    }

    async fn delete_domain_name(&self, domain: &str) -> Result<()> {
        self.record(Call::DeleteGraphDomain(domain.to_string()));
        self.check(Op::DeleteGraphDomain)?;
        let mut state = self.state();
        let binding = state
            .graph_domains
            .iter()
            .find(|d| same_domain(&d.domain_name, domain))
            .ok_or_else(|| not_found("domain name", domain))?;
        if binding.associated_api_id.is_some() {
            return Err(in_use(format!("Domain name {domain} is associated with an API")));
        }
        state
            .graph_domains
            .retain(|d| !same_domain(&d.domain_name, domain));
        Ok(())
    }

    async fn delete_graph_api(&self, api_id: &str) -> Result<()> {
        self.record(Call::DeleteGraphApi(api_id.to_string()));
        self.check(Op::DeleteGraphApi)?;
        let mut state = self.state();
        let before = state.graph_apis.len();
        state.graph_apis.retain(|a| a.api_id != api_id);
        if state.graph_apis.len() == before {
            return Err(not_found("graphql api", api_id));
        }
        Ok(())
    }
}

impl TableOperations for FakeCloud {
    async fn describe_table(&self, name: &str) -> Result<Option<TableInfo>> {
        self.check(Op::DescribeTable)?;
        Ok(self
            .state()
            .tables
            .iter()
            .find(|(t, _)| t.name == name)
            .map(|(t, _)| t.clone()))
    }

    async fn table_tags(&self, arn: &str) -> Result<HashMap<String, String>> {
        self.state()
            .tables
            .iter()
            .find(|(t, _)| t.arn == arn)
            .map(|(_, tags)| tags.clone())
            .ok_or_else(|| not_found("table", arn))
    }
}

impl BucketOperations for FakeCloud {
    async fn bucket_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state().buckets.iter().any(|(b, _)| b == name))
    }

    async fn bucket_tags(&self, name: &str) -> Result<HashMap<String, String>> {
        Ok(self
            .state()
            .buckets
            .iter()
            .find(|(b, _)| b == name)
            .map(|(_, tags)| tags.clone())
            .unwrap_or_default())
    }
}

impl StackOperations for FakeCloud {
    async fn list_stack_resources(&self, stack_name: &str) -> Result<Vec<StackResource>> {
        self.check(Op::ListStackResources)?;
        self.state()
            .stack
            .clone()
            .ok_or_else(|| not_found("stack", stack_name))
    }
}

impl CloudApi for FakeCloud {
    type Certificates = Self;
    type Dns = Self;
    type Auth = Self;
    type Cdn = Self;
    type Graph = Self;
    type Tables = Self;
    type Buckets = Self;
    type Stacks = Self;

    fn certificates(&self) -> &Self {
        self
    }

    fn dns(&self) -> &Self {
        self
    }

    fn auth(&self) -> &Self {
        self
    }

    fn cdn(&self) -> &Self {
        self
    }

    fn graph(&self) -> &Self {
        self
    }

    fn tables(&self) -> &Self {
        self
    }

    fn buckets(&self) -> &Self {
        self
    }

    fn stacks(&self) -> &Self {
        self
    }
}
