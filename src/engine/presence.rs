use dashmap::DashSet;

use crate::model::MemberId;

/// Members currently in the building. Only present members may hold or wait.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    active: DashSet<MemberId>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, members: impl IntoIterator<Item = MemberId>) {
        for m in members {
            self.active.insert(m);
        }
    }

    /// Returns true if the member was not already present.
    pub fn enter(&self, member_id: MemberId) -> bool {
        self.active.insert(member_id)
    }

    /// Returns true if the member was present.
    pub fn leave(&self, member_id: MemberId) -> bool {
        self.active.remove(&member_id).is_some()
    }

    pub fn is_active(&self, member_id: MemberId) -> bool {
        self.active.contains(&member_id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&self) {
        self.active.clear();
    }
}
