use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub rooms: Option<u32>,
}

impl Listing {
    pub fn label(&self) -> String {
        match self.rooms {
            Some(rooms) if rooms > 0 => format!("{} — {} ({rooms} room(s))", self.name, self.city),
            _ => format!("{} — {}", self.name, self.city),
        }
    }
}
