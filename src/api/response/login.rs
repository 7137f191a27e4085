use serde::Deserialize;

#[derive(Deserialize)]
pub struct Data {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct Login {
    #[serde(default)]
    pub data: Option<Data>,
}

impl Login {
    pub fn token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.token.as_deref())
            .filter(|token| !token.is_empty())
    }
}
