use std::collections::HashMap;

use anyhow::Result;

use crate::model::employee::Employee;
use crate::model::site::Site;
use crate::store::Directory;

/// Per-run lookup tables mapping external identifiers onto internal records.
/// Rebuilt at the start of every sync cycle; never cached across runs so
/// roster changes take effect on the next cycle.
pub struct IdentityMaps {
    employees_by_device: HashMap<String, Employee>,
    sites_by_code: HashMap<String, Site>,
}

impl IdentityMaps {
    pub fn build(employees: Vec<Employee>, sites: Vec<Site>) -> Self {
        let employees_by_device = employees
            .into_iter()
            .filter_map(|e| e.device_identifier.clone().map(|id| (id, e)))
            .collect();
        let sites_by_code = sites
            .into_iter()
            .filter_map(|s| s.external_code.clone().map(|code| (code, s)))
            .collect();

        Self {
            employees_by_device,
            sites_by_code,
        }
    }

    pub async fn load(directory: &dyn Directory, tenant_id: u64) -> Result<Self> {
        let employees = directory.employees_with_devices(tenant_id).await?;
        let sites = directory.active_sites(tenant_id).await?;
        Ok(Self::build(employees, sites))
    }

    pub fn resolve(&self, device_id: &str, site_code: &str) -> Option<(&Employee, &Site)> {
        let employee = self.employees_by_device.get(device_id)?;
        let site = self.sites_by_code.get(site_code)?;
        Some((employee, site))
    }

    pub fn employee(&self, device_id: &str) -> Option<&Employee> {
        self.employees_by_device.get(device_id)
    }

    pub fn mapped_device_count(&self) -> usize {
        self.employees_by_device.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: u64, device: Option<&str>) -> Employee {
        Employee {
            id,
            tenant_id: 1,
            employee_code: format!("EMP-{id:03}"),
            first_name: "Test".into(),
            last_name: "Worker".into(),
            email: format!("worker{id}@example.com"),
            phone: None,
            device_identifier: device.map(Into::into),
            is_deleted: false,
        }
    }

    fn site(id: u64, code: Option<&str>) -> Site {
        Site {
            id,
            tenant_id: 1,
            name: format!("Site {id}"),
            external_code: code.map(Into::into),
            latitude: None,
            longitude: None,
            geofence_radius_m: None,
            is_active: true,
            is_deleted: false,
        }
    }

    #[test]
    fn resolves_mapped_pairs_only() {
        let maps = IdentityMaps::build(
            vec![employee(1, Some("dev-1")), employee(2, None)],
            vec![site(10, Some("SITE-A")), site(11, None)],
        );

        assert!(maps.resolve("dev-1", "SITE-A").is_some());
        assert!(maps.resolve("dev-1", "SITE-B").is_none());
        assert!(maps.resolve("dev-9", "SITE-A").is_none());
        assert_eq!(maps.mapped_device_count(), 1);
    }
}
