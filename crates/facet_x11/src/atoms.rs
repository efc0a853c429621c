use crate::{utils::resource_id, ResourceId};

resource_id!(AtomId);

/// Only the predefined atoms this crate needs. Everything else goes through `InternAtom`.
impl AtomId {
    pub const ATOM: Self = Self(ResourceId::new(4));
    pub const STRING: Self = Self(ResourceId::new(31));
    pub const WM_NAME: Self = Self(ResourceId::new(39));
}
