// System endpoints

use tracing::debug;

use crate::client::RouterClient;
use crate::error::Error;
use crate::models::{RosIdentity, RosResource};

impl RouterClient {
    /// Fetch the router identity name.
    ///
    /// `GET /rest/system/identity`
    pub async fn identity(&self) -> Result<RosIdentity, Error> {
        let url = self.rest_url("system/identity")?;
        debug!("fetching system identity");
        self.get(url).await
    }

    /// Fetch system resource info (uptime, version, CPU load).
    ///
    /// `GET /rest/system/resource`
    pub async fn resource(&self) -> Result<RosResource, Error> {
        let url = self.rest_url("system/resource")?;
        debug!("fetching system resource");
        self.get(url).await
    }
}
