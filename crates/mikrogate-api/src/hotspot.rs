// Hotspot endpoints
//
// User management under /ip/hotspot/user, live sessions under
// /ip/hotspot/active, and user profiles under /ip/hotspot/user/profile.

use tracing::debug;

use crate::client::RouterClient;
use crate::error::Error;
use crate::models::{
    HotspotUserParams, ProfileParams, RosHotspotActive, RosHotspotProfile, RosHotspotUser,
};

impl RouterClient {
    /// List all hotspot users.
    ///
    /// `GET /rest/ip/hotspot/user`
    pub async fn list_hotspot_users(&self) -> Result<Vec<RosHotspotUser>, Error> {
        let url = self.rest_url("ip/hotspot/user")?;
        debug!("listing hotspot users");
        self.get(url).await
    }

    /// Look up hotspot users by exact name (usually zero or one entry).
    ///
    /// `GET /rest/ip/hotspot/user?name={name}`
    pub async fn find_hotspot_users(&self, name: &str) -> Result<Vec<RosHotspotUser>, Error> {
        let mut url = self.rest_url("ip/hotspot/user")?;
        url.query_pairs_mut().append_pair("name", name);
        debug!(name, "finding hotspot user");
        self.get(url).await
    }

    /// Create a hotspot user. Returns the created entry (with `.id`).
    ///
    /// `PUT /rest/ip/hotspot/user`
    pub async fn add_hotspot_user(
        &self,
        params: &HotspotUserParams,
    ) -> Result<RosHotspotUser, Error> {
        let url = self.rest_url("ip/hotspot/user")?;
        debug!(name = params.name.as_deref().unwrap_or(""), "adding hotspot user");
        self.put(url, params).await
    }

    /// Update a hotspot user in place. Only set fields are touched.
    ///
    /// `PATCH /rest/ip/hotspot/user/{id}`
    pub async fn set_hotspot_user(
        &self,
        id: &str,
        params: &HotspotUserParams,
    ) -> Result<RosHotspotUser, Error> {
        let url = self.rest_url(&format!("ip/hotspot/user/{id}"))?;
        debug!(id, "updating hotspot user");
        self.patch(url, params).await
    }

    /// Remove a hotspot user.
    ///
    /// `DELETE /rest/ip/hotspot/user/{id}`
    pub async fn remove_hotspot_user(&self, id: &str) -> Result<(), Error> {
        let url = self.rest_url(&format!("ip/hotspot/user/{id}"))?;
        debug!(id, "removing hotspot user");
        self.delete(url).await
    }

    /// List live hotspot sessions.
    ///
    /// `GET /rest/ip/hotspot/active`
    pub async fn list_hotspot_active(&self) -> Result<Vec<RosHotspotActive>, Error> {
        let url = self.rest_url("ip/hotspot/active")?;
        debug!("listing active hotspot sessions");
        self.get(url).await
    }

    /// Force-logout a live hotspot session.
    ///
    /// `DELETE /rest/ip/hotspot/active/{id}`
    pub async fn remove_hotspot_active(&self, id: &str) -> Result<(), Error> {
        let url = self.rest_url(&format!("ip/hotspot/active/{id}"))?;
        debug!(id, "removing active hotspot session");
        self.delete(url).await
    }

    /// List hotspot user profiles.
    ///
    /// `GET /rest/ip/hotspot/user/profile`
    pub async fn list_hotspot_profiles(&self) -> Result<Vec<RosHotspotProfile>, Error> {
        let url = self.rest_url("ip/hotspot/user/profile")?;
        debug!("listing hotspot user profiles");
        self.get(url).await
    }

    /// Create a hotspot user profile.
    ///
    /// `PUT /rest/ip/hotspot/user/profile`
    pub async fn add_hotspot_profile(
        &self,
        params: &ProfileParams,
    ) -> Result<RosHotspotProfile, Error> {
        let url = self.rest_url("ip/hotspot/user/profile")?;
        debug!(name = params.name.as_deref().unwrap_or(""), "adding hotspot profile");
        self.put(url, params).await
    }
}
