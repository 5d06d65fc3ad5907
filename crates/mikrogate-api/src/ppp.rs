// PPP endpoints
//
// PPPoE secrets under /ppp/secret, live sessions under /ppp/active,
// profiles under /ppp/profile.

use tracing::debug;

use crate::client::RouterClient;
use crate::error::Error;
use crate::models::{PppSecretParams, ProfileParams, RosPppActive, RosPppProfile, RosPppSecret};

impl RouterClient {
    /// List all PPP secrets.
    ///
    /// `GET /rest/ppp/secret`
    pub async fn list_ppp_secrets(&self) -> Result<Vec<RosPppSecret>, Error> {
        let url = self.rest_url("ppp/secret")?;
        debug!("listing ppp secrets");
        self.get(url).await
    }

    /// Look up PPP secrets by exact name (usually zero or one entry).
    ///
    /// `GET /rest/ppp/secret?name={name}`
    pub async fn find_ppp_secrets(&self, name: &str) -> Result<Vec<RosPppSecret>, Error> {
        let mut url = self.rest_url("ppp/secret")?;
        url.query_pairs_mut().append_pair("name", name);
        debug!(name, "finding ppp secret");
        self.get(url).await
    }

    /// Create a PPP secret. Returns the created entry (with `.id`).
    ///
    /// `PUT /rest/ppp/secret`
    pub async fn add_ppp_secret(&self, params: &PppSecretParams) -> Result<RosPppSecret, Error> {
        let url = self.rest_url("ppp/secret")?;
        debug!(name = params.name.as_deref().unwrap_or(""), "adding ppp secret");
        self.put(url, params).await
    }

    /// Update a PPP secret in place. Only set fields are touched.
    ///
    /// `PATCH /rest/ppp/secret/{id}`
    pub async fn set_ppp_secret(
        &self,
        id: &str,
        params: &PppSecretParams,
    ) -> Result<RosPppSecret, Error> {
        let url = self.rest_url(&format!("ppp/secret/{id}"))?;
        debug!(id, "updating ppp secret");
        self.patch(url, params).await
    }

    /// Remove a PPP secret.
    ///
    /// `DELETE /rest/ppp/secret/{id}`
    pub async fn remove_ppp_secret(&self, id: &str) -> Result<(), Error> {
        let url = self.rest_url(&format!("ppp/secret/{id}"))?;
        debug!(id, "removing ppp secret");
        self.delete(url).await
    }

    /// List live PPP sessions.
    ///
    /// `GET /rest/ppp/active`
    pub async fn list_ppp_active(&self) -> Result<Vec<RosPppActive>, Error> {
        let url = self.rest_url("ppp/active")?;
        debug!("listing active ppp sessions");
        self.get(url).await
    }

    /// Force-disconnect a live PPP session.
    ///
    /// `DELETE /rest/ppp/active/{id}`
    pub async fn remove_ppp_active(&self, id: &str) -> Result<(), Error> {
        let url = self.rest_url(&format!("ppp/active/{id}"))?;
        debug!(id, "removing active ppp session");
        self.delete(url).await
    }

    /// List PPP profiles.
    ///
    /// `GET /rest/ppp/profile`
    pub async fn list_ppp_profiles(&self) -> Result<Vec<RosPppProfile>, Error> {
        let url = self.rest_url("ppp/profile")?;
        debug!("listing ppp profiles");
        self.get(url).await
    }

    /// Create a PPP profile.
    ///
    /// `PUT /rest/ppp/profile`
    pub async fn add_ppp_profile(&self, params: &ProfileParams) -> Result<RosPppProfile, Error> {
        let url = self.rest_url("ppp/profile")?;
        debug!(name = params.name.as_deref().unwrap_or(""), "adding ppp profile");
        self.put(url, params).await
    }
}
