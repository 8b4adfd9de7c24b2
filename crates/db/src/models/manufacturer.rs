use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::Searchable;

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct Manufacturer {
    pub id: Uuid,
    pub name: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Searchable for Manufacturer {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.contact_email.as_deref());
        fields
    }
}
