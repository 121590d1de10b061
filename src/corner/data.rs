//! Data sources backed by the session store.

use async_trait::async_trait;

use crate::corner::user::USER_KIND;
use crate::data_source::DataSource;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Schema};
use crate::session::SessionContext;
use crate::store::REGION_KIND;
use crate::value::{Type, Value};

/// `corner_regions`: the names in the seeded region table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionsDataSource;

#[async_trait]
impl DataSource for RegionsDataSource {
    fn schema(&self) -> Schema {
        Schema::v0().with_attribute(
            "names",
            Attribute::new(Type::list(Type::String), AttributeFlags::computed()),
        )
    }

    async fn read(&self, ctx: &SessionContext, config: &Value) -> Result<Value, ProviderError> {
        let txn = ctx.read_txn().await?;
        let names = txn
            .list(REGION_KIND)?
            .into_iter()
            .map(|record| Value::string(record.key))
            .collect();
        Ok(config.clone().with_attr("names", Value::list(Type::String, names)?))
    }
}

/// `corner_user`: look up a user by email.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataSource;

#[async_trait]
impl DataSource for UserDataSource {
    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("email", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("age", Attribute::computed_number())
    }

    async fn read(&self, ctx: &SessionContext, config: &Value) -> Result<Value, ProviderError> {
        let email = config
            .get_attr("email")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Validation("attribute \"email\" must be a known string".to_string())
            })?;
        let txn = ctx.read_txn().await?;
        let record = txn
            .get(USER_KIND, email)?
            .ok_or_else(|| ProviderError::NotFound(format!("user \"{}\"", email)))?;
        let name = record.field("name").and_then(serde_json::Value::as_str).unwrap_or_default();
        let age = record.field("age").and_then(serde_json::Value::as_f64).unwrap_or_default();
        Ok(config
            .clone()
            .with_attr("name", Value::string(name))
            .with_attr("age", Value::number(age)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corner::user::user_record;
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_regions_lists_seed_table() {
        let ctx = SessionContext::detached(Arc::new(MemoryStore::seeded()));
        let config = Value::object([("names", Value::null(Type::list(Type::String)))]);
        let state = RegionsDataSource.read(&ctx, &config).await.unwrap();
        let names: Vec<_> = state
            .get_attr("names")
            .and_then(Value::as_elements)
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(names, vec!["EU", "UK", "USA"]);
    }

    #[tokio::test]
    async fn test_user_lookup() {
        let store = MemoryStore::new();
        let mut txn = store.begin_write().await.unwrap();
        txn.put(USER_KIND, user_record("ford@prefect.co", "Ford", 200.0)).unwrap();
        txn.commit().unwrap();
        let ctx = SessionContext::detached(Arc::new(store));

        let config = Value::object([
            ("email", Value::string("ford@prefect.co")),
            ("name", Value::null(Type::String)),
            ("age", Value::null(Type::Number)),
        ]);
        let state = UserDataSource.read(&ctx, &config).await.unwrap();
        assert_eq!(state.get_attr("age"), Some(&Value::number(200.0)));

        let missing = config.with_attr("email", Value::string("arthur@dent.co"));
        let err = UserDataSource.read(&ctx, &missing).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
