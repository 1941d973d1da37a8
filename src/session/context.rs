//! Customer context
//!
//! Which customer account the session is currently acting for. Owned by one
//! `Session` and written only through these setters.

use serde::Serialize;

use crate::upstream::{CustomerAccount, RecordId};

/// Active customer id plus the generation it was set in.
///
/// Fetches are stamped with a scope; a response whose scope is no longer
/// current belongs to an earlier customer and must be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub customer_id: RecordId,
    pub generation: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerContext {
    pub email: Option<String>,
    pub customer_id: Option<RecordId>,
    pub customer_name: Option<String>,
    pub customer_legal_id: Option<String>,
    #[serde(skip)]
    generation: u64,
}

impl CustomerContext {
    pub fn for_email(email: impl Into<String>) -> Self {
        let mut ctx = Self::default();
        ctx.set_email(email);
        ctx
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = Some(email.into());
    }

    /// Returns true when the id actually changed (and the scope moved on).
    pub fn set_customer_id(&mut self, customer_id: Option<RecordId>) -> bool {
        if self.customer_id == customer_id {
            return false;
        }
        self.customer_id = customer_id;
        self.generation += 1;
        true
    }

    pub fn set_customer_name(&mut self, name: Option<String>) {
        self.customer_name = name;
    }

    pub fn set_customer_legal_id(&mut self, legal_id: Option<String>) {
        self.customer_legal_id = legal_id;
    }

    /// Switch the active customer to `account` in one step.
    pub fn select_account(&mut self, account: &CustomerAccount) -> bool {
        self.set_customer_name(Some(account.name.clone()));
        self.set_customer_legal_id(account.legal_id.clone());
        self.set_customer_id(Some(account.customer_id.clone()))
    }

    /// `None` until a customer id is known.
    pub fn scope(&self) -> Option<Scope> {
        self.customer_id.as_ref().map(|id| Scope {
            customer_id: id.clone(),
            generation: self.generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account(id: i64, name: &str) -> CustomerAccount {
        serde_json::from_value(json!({ "ZakaznikId": id, "Nazev": name, "IC": "25596641" })).unwrap()
    }

    #[test]
    fn test_no_scope_before_customer_is_known() {
        let ctx = CustomerContext::for_email("jana@firma.cz");
        assert!(ctx.scope().is_none());
    }

    #[test]
    fn test_generation_moves_only_on_real_change() {
        let mut ctx = CustomerContext::default();
        assert!(ctx.set_customer_id(Some(RecordId::from(1))));
        let first = ctx.scope().unwrap();

        assert!(!ctx.set_customer_id(Some(RecordId::from(1))));
        assert_eq!(ctx.scope().unwrap(), first);

        assert!(ctx.set_customer_id(Some(RecordId::from(2))));
        let second = ctx.scope().unwrap();
        assert_ne!(first.generation, second.generation);
    }

    #[test]
    fn test_switching_back_is_a_new_scope() {
        let mut ctx = CustomerContext::default();
        ctx.set_customer_id(Some(RecordId::from(1)));
        let first = ctx.scope().unwrap();
        ctx.set_customer_id(Some(RecordId::from(2)));
        ctx.set_customer_id(Some(RecordId::from(1)));
        assert_ne!(ctx.scope().unwrap(), first);
    }

    #[test]
    fn test_select_account_sets_all_fields() {
        let mut ctx = CustomerContext::for_email("jana@firma.cz");
        ctx.select_account(&account(7, "Pekárna Novák"));
        assert_eq!(ctx.customer_id, Some(RecordId::from(7)));
        assert_eq!(ctx.customer_name.as_deref(), Some("Pekárna Novák"));
        assert_eq!(ctx.customer_legal_id.as_deref(), Some("25596641"));
        assert_eq!(ctx.email.as_deref(), Some("jana@firma.cz"));
    }
}
