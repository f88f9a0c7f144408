//! Diffing the target state against the records in the collection.
//!
//! Record ids are not derived from the signatures themselves. The n-th group
//! produced by the source always gets `id-<n>`, so as long as the source
//! yields groups in a stable order, re-running against unchanged data
//! rewrites the same records with the same content instead of deleting and
//! recreating them.
use indexmap::IndexMap;
use remote_settings::RemoteRecord;
use signatures::SignatureGroup;
use std::collections::HashSet;

/// Placeholder for the OS slot of groups published without one.
const NO_OS: &str = "-";

/// Formats the id for the group at position `sequence`.
pub fn record_id(sequence: usize) -> String {
    format!("id-{sequence:03}")
}

/// Human-readable label for a group: `<process> (<os> <channel>): <signature>`.
///
/// The OS slot is always present (`-` when unknown) so a channel name can
/// never be read as an OS. The signature key is appended when it differs from
/// the signature text, so groups that share a signature but come from
/// different partitions stay distinguishable.
pub fn describe(group: &SignatureGroup) -> String {
    let os = group.os.as_deref().unwrap_or(NO_OS);
    let mut description = format!(
        "{} ({os} {}): {}",
        group.process_type, group.channel, group.signature
    );
    if group.signature_key != group.signature {
        description.push_str(&format!(" [{}]", group.signature_key));
    }
    description
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upsert {
    pub id: String,
    pub description: String,
    pub hashes: Vec<String>,
}

impl Upsert {
    fn matches(&self, record: &RemoteRecord) -> bool {
        record.id == self.id && record.description == self.description && record.hashes == self.hashes
    }
}

/// Operations that bring the collection to the target state.
///
/// Upserts are in id assignment order and must all be applied before any
/// delete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub upserts: Vec<Upsert>,
    pub deletes: Vec<RemoteRecord>,
}

impl ReconciliationPlan {
    pub fn total_hashes(&self) -> usize {
        self.upserts.iter().map(|u| u.hashes.len()).sum()
    }

    pub fn generated_ids(&self) -> impl Iterator<Item = &str> {
        self.upserts.iter().map(|u| u.id.as_str())
    }

    /// Number of upserts that would leave an observed record unchanged.
    pub fn unchanged(&self, observed: &[RemoteRecord]) -> usize {
        let by_id: IndexMap<&str, &RemoteRecord> =
            observed.iter().map(|r| (r.id.as_str(), r)).collect();

        self.upserts
            .iter()
            .filter(|u| by_id.get(u.id.as_str()).is_some_and(|r| u.matches(r)))
            .count()
    }
}

/// Computes the plan for `groups` against the `observed` records.
///
/// Groups are consumed in iteration order. The first error aborts the whole
/// computation, so a malformed group anywhere means nothing is applied.
///
/// Descriptions are unique within a plan. A group whose description was
/// already taken by an earlier group gets a ` #<n>` suffix.
pub fn compute_plan<I, E>(groups: I, observed: &[RemoteRecord]) -> Result<ReconciliationPlan, E>
where
    I: IntoIterator<Item = Result<SignatureGroup, E>>,
{
    let mut generated: IndexMap<String, Upsert> = IndexMap::new();
    let mut descriptions: HashSet<String> = HashSet::new();

    for group in groups {
        let group = group?;
        let id = record_id(generated.len());
        let description = unique_description(describe(&group), &mut descriptions);

        generated.insert(
            id.clone(),
            Upsert {
                id,
                description,
                hashes: group.hashes,
            },
        );
    }

    let deletes = observed
        .iter()
        .filter(|record| !generated.contains_key(&record.id))
        .cloned()
        .collect();

    Ok(ReconciliationPlan {
        upserts: generated.into_values().collect(),
        deletes,
    })
}

fn unique_description(base: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.clone()) {
        return base;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{base} #{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
