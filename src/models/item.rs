use crate::db::DbResult;
use crate::models::types::{ItemId, Metadata};
use postgres_types::private::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type};
use serde::{Deserialize, Serialize};
use std::error::Error;
use tokio_postgres::Row;

/// Policy deciding where newly granted units of a stackable item end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackBalancingMethod {
    #[default]
    Default,
    UnbalancedCreateNewStacks,
    UnbalancedFillExistingStacks,
    BalancedFillExistingStacks,
}

impl StackBalancingMethod {
    pub fn as_i32(self) -> i32 {
        match self {
            StackBalancingMethod::Default => 0,
            StackBalancingMethod::UnbalancedCreateNewStacks => 1,
            StackBalancingMethod::UnbalancedFillExistingStacks => 2,
            StackBalancingMethod::BalancedFillExistingStacks => 3,
        }
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(StackBalancingMethod::Default),
            1 => Some(StackBalancingMethod::UnbalancedCreateNewStacks),
            2 => Some(StackBalancingMethod::UnbalancedFillExistingStacks),
            3 => Some(StackBalancingMethod::BalancedFillExistingStacks),
            _ => None,
        }
    }

    /// Whether grants top up existing stacks before creating new ones.
    pub fn fills_existing(self) -> bool {
        matches!(
            self,
            StackBalancingMethod::UnbalancedFillExistingStacks | StackBalancingMethod::BalancedFillExistingStacks
        )
    }
}

impl ToSql for StackBalancingMethod {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.as_i32().to_sql(ty, out)
    }

    fn accepts(ty: &Type) -> bool {
        ty == &Type::INT4
    }

    fn to_sql_checked(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.to_sql(ty, out)
    }
}

impl FromSql<'_> for StackBalancingMethod {
    fn from_sql(ty: &Type, raw: &[u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let v = i32::from_sql(ty, raw)?;
        StackBalancingMethod::from_i32(v).ok_or_else(|| format!("Unknown stack balancing method: {}", v).into())
    }

    fn accepts(ty: &Type) -> bool {
        ty == &Type::INT4
    }
}

impl std::fmt::Display for StackBalancingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackBalancingMethod::Default => write!(f, "DEFAULT"),
            StackBalancingMethod::UnbalancedCreateNewStacks => write!(f, "UNBALANCED_CREATE_NEW_STACKS"),
            StackBalancingMethod::UnbalancedFillExistingStacks => write!(f, "UNBALANCED_FILL_EXISTING_STACKS"),
            StackBalancingMethod::BalancedFillExistingStacks => write!(f, "BALANCED_FILL_EXISTING_STACKS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Whether units of this item accumulate into stacks
    pub stackable: bool,
    /// Largest amount a single stack may hold; 0 means unbounded
    pub stack_max_amount: i64,
    pub stack_balancing_method: StackBalancingMethod,
    pub metadata: Metadata,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Item {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            stackable: row.try_get("stackable")?,
            stack_max_amount: row.try_get("stack_max_amount")?,
            stack_balancing_method: row.try_get("stack_balancing_method")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// True when stacks of this item have an upper bound.
    pub fn is_capped(&self) -> bool {
        self.stackable && self.stack_max_amount > 0
    }
}

/// Fields accepted by `CreateItem`.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub name: String,
    pub stackable: bool,
    pub stack_max_amount: i64,
    pub stack_balancing_method: StackBalancingMethod,
    pub metadata: Metadata,
}
