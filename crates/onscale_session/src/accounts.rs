use onscale_core::prelude::*;

use crate::error::{OnscaleError, Result};

/// Which HPC a job should run on.
///
/// An explicit id beats a region, which beats a cloud. Without any, the account default
/// (the first active HPC the platform lists) is used. Inactive HPCs are never selected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HpcSelector {
    #[default]
    AccountDefault,
    Id(String),
    Region(String),
    Cloud(String),
}

impl HpcSelector {
    /// Builds a selector from optional hints, applying their precedence.
    pub fn from_hints(id: Option<&str>, region: Option<&str>, cloud: Option<&str>) -> Self {
        match (id, region, cloud) {
            (Some(id), _, _) => HpcSelector::Id(id.to_string()),
            (None, Some(region), _) => HpcSelector::Region(region.to_string()),
            (None, None, Some(cloud)) => HpcSelector::Cloud(cloud.to_string()),
            (None, None, None) => HpcSelector::AccountDefault,
        }
    }

    /// Picks the descriptor this selector designates out of an account's HPC listing.
    pub fn select<'a>(&self, hpcs: &'a [HpcDescriptor]) -> Result<&'a HpcDescriptor> {
        let found = match self {
            HpcSelector::AccountDefault => hpcs.iter().find(|h| h.active),
            HpcSelector::Id(id) => hpcs.iter().find(|h| h.active && h.hpc_id == *id),
            HpcSelector::Region(region) => hpcs
                .iter()
                .find(|h| h.active && h.hpc_region.eq_ignore_ascii_case(region)),
            HpcSelector::Cloud(cloud) => hpcs
                .iter()
                .find(|h| h.active && h.hpc_cloud.eq_ignore_ascii_case(cloud)),
        };
        found.ok_or_else(|| OnscaleError::NotFound(format!("no HPC matching {self:?}")))
    }
}

/// The accounts visible to a session and the one currently selected.
#[derive(Debug, Clone)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
    current: usize,
}

impl AccountDirectory {
    /// The first account is the primary one and starts out selected.
    pub fn new(accounts: Vec<Account>) -> Result<Self> {
        if accounts.is_empty() {
            return Err(OnscaleError::NotFound(
                "no accounts are visible to this user".into(),
            ));
        }
        Ok(Self {
            accounts,
            current: 0,
        })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn primary(&self) -> &Account {
        &self.accounts[0]
    }

    pub fn current(&self) -> &Account {
        &self.accounts[self.current]
    }

    pub fn names(&self) -> Vec<&str> {
        self.accounts.iter().map(|a| a.account_name.as_str()).collect()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.accounts.iter().map(|a| a.account_id.as_str()).collect()
    }

    fn position_by_id(&self, id: &str) -> Result<usize> {
        self.accounts
            .iter()
            .position(|a| a.account_id == id)
            .ok_or_else(|| OnscaleError::NotFound(format!("account id '{id}'")))
    }

    fn position_by_name(&self, name: &str) -> Result<usize> {
        let matches: Vec<usize> = self
            .accounts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.account_name == name)
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => Err(OnscaleError::NotFound(format!("account name '{name}'"))),
            [one] => Ok(*one),
            many => Err(OnscaleError::AmbiguousAccountName {
                name: name.to_string(),
                ids: many
                    .iter()
                    .map(|i| self.accounts[*i].account_id.clone())
                    .collect(),
            }),
        }
    }

    pub fn by_name(&self, name: &str) -> Result<&Account> {
        Ok(&self.accounts[self.position_by_name(name)?])
    }

    pub fn by_id(&self, id: &str) -> Result<&Account> {
        Ok(&self.accounts[self.position_by_id(id)?])
    }

    /// Selects the current account by exactly one of name or id.
    pub fn set_current(&mut self, name: Option<&str>, id: Option<&str>) -> Result<&Account> {
        self.current = match (name, id) {
            (Some(_), Some(_)) => {
                return Err(OnscaleError::ParameterConflict(
                    "select an account by name or by id, not both".into(),
                ));
            }
            (None, None) => {
                return Err(OnscaleError::MissingParameter(
                    "an account name or id is required".into(),
                ));
            }
            (Some(name), None) => self.position_by_name(name)?,
            (None, Some(id)) => self.position_by_id(id)?,
        };
        Ok(self.current())
    }

    /// Selects by id when `preference` is a UUID and by name otherwise.
    pub fn set_preferred(&mut self, preference: &str) -> Result<&Account> {
        if uuid::Uuid::parse_str(preference).is_ok() {
            self.set_current(None, Some(preference))
        } else {
            self.set_current(Some(preference), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, name: &str) -> Account {
        Account {
            account_id: id.into(),
            account_name: name.into(),
            ..Default::default()
        }
    }

    fn hpc(id: &str, cloud: &str, region: &str, active: bool) -> HpcDescriptor {
        HpcDescriptor {
            hpc_id: id.into(),
            hpc_cloud: cloud.into(),
            hpc_region: region.into(),
            active,
            ..Default::default()
        }
    }

    fn directory() -> AccountDirectory {
        AccountDirectory::new(vec![
            account("a-1", "Acme"),
            account("a-2", "Beta"),
            account("a-3", "Beta"),
        ])
        .unwrap()
    }

    #[test]
    fn primary_is_initially_current() {
        let dir = directory();
        assert_eq!(dir.current().account_id, "a-1");
        assert_eq!(dir.primary().account_id, "a-1");
        assert_eq!(dir.names(), vec!["Acme", "Beta", "Beta"]);
    }

    #[test]
    fn empty_directory_is_not_found() {
        assert!(matches!(
            AccountDirectory::new(vec![]),
            Err(OnscaleError::NotFound(_))
        ));
    }

    #[test]
    fn set_current_selector_rules() {
        let mut dir = directory();
        assert!(matches!(
            dir.set_current(Some("Acme"), Some("a-1")),
            Err(OnscaleError::ParameterConflict(_))
        ));
        assert!(matches!(
            dir.set_current(None, None),
            Err(OnscaleError::MissingParameter(_))
        ));
        assert!(matches!(
            dir.set_current(Some("Nobody"), None),
            Err(OnscaleError::NotFound(_))
        ));

        assert_eq!(dir.set_current(None, Some("a-3")).unwrap().account_id, "a-3");
        assert_eq!(dir.set_current(Some("Acme"), None).unwrap().account_id, "a-1");
    }

    #[test]
    fn duplicate_names_must_be_selected_by_id() {
        let mut dir = directory();
        match dir.set_current(Some("Beta"), None) {
            Err(OnscaleError::AmbiguousAccountName { name, ids }) => {
                assert_eq!(name, "Beta");
                assert_eq!(ids, vec!["a-2".to_string(), "a-3".to_string()]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        // A failed selection keeps the previous one.
        assert_eq!(dir.current().account_id, "a-1");
    }

    #[test]
    fn preference_by_uuid_or_name() {
        let id = "0954e70b-237a-4cdb-a267-b5da0f67dd70";
        let mut dir =
            AccountDirectory::new(vec![account("a-1", "Acme"), account(id, "Gamma")]).unwrap();
        assert_eq!(dir.set_preferred(id).unwrap().account_name, "Gamma");
        assert_eq!(dir.set_preferred("Acme").unwrap().account_id, "a-1");
    }

    #[test]
    fn hpc_selector_precedence() {
        assert_eq!(
            HpcSelector::from_hints(Some("h"), Some("r"), Some("c")),
            HpcSelector::Id("h".into())
        );
        assert_eq!(
            HpcSelector::from_hints(None, Some("r"), Some("c")),
            HpcSelector::Region("r".into())
        );
        assert_eq!(
            HpcSelector::from_hints(None, None, Some("c")),
            HpcSelector::Cloud("c".into())
        );
        assert_eq!(
            HpcSelector::from_hints(None, None, None),
            HpcSelector::AccountDefault
        );
    }

    #[test]
    fn hpc_selection_skips_inactive() {
        let hpcs = vec![
            hpc("h-1", "AWS", "us-east-1", false),
            hpc("h-2", "AWS", "us-west-2", true),
            hpc("h-3", "GCP", "us-east-1", true),
        ];
        assert_eq!(
            HpcSelector::AccountDefault.select(&hpcs).unwrap().hpc_id,
            "h-2"
        );
        assert_eq!(
            HpcSelector::Cloud("aws".into()).select(&hpcs).unwrap().hpc_id,
            "h-2"
        );
        assert_eq!(
            HpcSelector::Region("us-east-1".into())
                .select(&hpcs)
                .unwrap()
                .hpc_id,
            "h-3"
        );
        assert!(HpcSelector::Id("h-1".into()).select(&hpcs).is_err());
        assert!(HpcSelector::Id("h-9".into()).select(&hpcs).is_err());
    }
}
