//! Change notifications for data shown across pages (profile, household, pantry).

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Area of application data that changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataScope {
    Profile,
    Household,
    Locations,
    Categories,
}

impl DataScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataScope::Profile => "profile",
            DataScope::Household => "household",
            DataScope::Locations => "locations",
            DataScope::Categories => "categories",
        }
    }
}

/// A single change, tagged with the household it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataChange {
    pub scope: DataScope,
    pub group_id: Option<Uuid>,
}

impl DataChange {
    /// Visible to members of `group_id`; untagged changes are visible to everyone
    pub fn visible_to(&self, group_id: Option<Uuid>) -> bool {
        self.group_id.is_none() || self.group_id == group_id
    }
}

#[derive(Debug, Clone)]
pub struct AppDataChanges {
    sender: broadcast::Sender<DataChange>,
}

impl Default for AppDataChanges {
    fn default() -> Self {
        AppDataChanges::new(64)
    }
}

impl AppDataChanges {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        AppDataChanges { sender }
    }

    /// Publishes a change; having no listeners is fine
    pub fn notify_changed(&self, scope: DataScope, group_id: Option<Uuid>) {
        let _ = self.sender.send(DataChange { scope, group_id });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataChange> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_changes() {
        let changes = AppDataChanges::default();
        let mut rx = changes.subscribe();
        let group = Uuid::new_v4();

        changes.notify_changed(DataScope::Household, Some(group));
        let change = rx.recv().await.unwrap();
        assert_eq!(change.scope, DataScope::Household);
        assert!(change.visible_to(Some(group)));
        assert!(!change.visible_to(Some(Uuid::new_v4())));
    }

    #[test]
    fn notify_without_listeners_is_silent() {
        let changes = AppDataChanges::new(0);
        changes.notify_changed(DataScope::Profile, None);
        assert_eq!(DataScope::Categories.as_str(), "categories");
    }
}
