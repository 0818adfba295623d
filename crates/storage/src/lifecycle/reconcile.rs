#![forbid(unsafe_code)]

use super::ResourceManager;
use crate::StoreError;
use crate::blob::BlobStore;
use crate::policy::{PolicyStore, PolicyTuple};
use crate::store::{all_resources, registered_objects};
use crate::types::ReconcileReport;

impl<B: BlobStore, P: PolicyStore> ResourceManager<B, P> {
    /// Brings the policy store back in line with the relational store.
    ///
    /// Every resource gets its three owner tuples (missing ones are granted in
    /// one batch per resource). Tuples naming a resource absent from the object
    /// registry are revoked. Safe to run repeatedly and alongside live traffic.
    ///
    /// The tuple listing is read before the registry: `create` registers a
    /// resource before granting, so any tuple seen here whose resource is live
    /// is also in the later registry snapshot.
    pub fn reconcile(&mut self) -> Result<ReconcileReport, StoreError> {
        let tuple_resources = self.policies.resources()?;
        let conn = self.store.conn();
        let registered = registered_objects(conn)?;
        let resources = all_resources(conn)?;
        let mut report = ReconcileReport {
            scanned: resources.len(),
            ..ReconcileReport::default()
        };

        for row in &resources {
            let mut missing = Vec::new();
            for tuple in PolicyTuple::owner_grants(row.owner, row.domain, &row.uuid) {
                if !self.policies.has_policy(&tuple)? {
                    missing.push(tuple);
                }
            }
            if missing.is_empty() {
                continue;
            }
            self.policies.add_policies(&missing)?;
            tracing::warn!(
                uuid = %row.uuid,
                subject = %row.owner,
                granted = missing.len(),
                "owner grants repaired"
            );
            report.repaired_grants += missing.len();
        }

        for resource in tuple_resources {
            if registered.contains(&resource) {
                continue;
            }
            let revoked = self.policies.remove_resource_policies(&resource)?;
            tracing::warn!(resource = %resource, revoked, "stale policy tuples revoked");
            report.revoked_stale += revoked;
        }

        tracing::info!(
            scanned = report.scanned,
            repaired_grants = report.repaired_grants,
            revoked_stale = report.revoked_stale,
            "reconcile finished"
        );
        Ok(report)
    }
}
