use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub role: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    pub email: String,
}

impl User {
    /// Role and position, in that order, skipping blanks.
    pub fn role_labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.role.as_str())
            .chain(self.position.as_deref())
            .filter(|label| !label.trim().is_empty())
    }

    pub fn has_role_label(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.role_labels().any(predicate)
    }

    pub fn same_department(&self, department: &str) -> bool {
        self.department.as_deref() == Some(department)
    }
}
