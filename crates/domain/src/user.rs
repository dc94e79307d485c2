use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier owned by the external user collection. The store is handed
/// these ids and never mints its own.
pub type UserId = String;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub image: Option<String>,
    /// Threads authored by this user, in creation order.
    pub threads: Vec<Uuid>,
}

impl User {
    pub fn author_view(&self) -> AuthorView {
        AuthorView {
            id: self.id.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
        }
    }
}

/// The author fields a resolved thread exposes.
#[derive(Clone, Debug, Serialize)]
pub struct AuthorView {
    pub id: UserId,
    pub name: String,
    pub image: Option<String>,
}
