/// The discrete actions available to the controlling agent.
///
/// The numeric encoding is part of the external contract; any action-space
/// declaration consumed by an agent must match it exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Hold = 0,
    ChangeLaneRight = 1,
    ChangeLaneLeft = 2,
    Accelerate = 3,
    Decelerate = 4,
    EmergencyBrake = 5,
}

impl Action {
    /// The size of the action space.
    pub const COUNT: usize = 6;

    /// Decodes an action index. Returns `None` outside the action space.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Hold),
            1 => Some(Self::ChangeLaneRight),
            2 => Some(Self::ChangeLaneLeft),
            3 => Some(Self::Accelerate),
            4 => Some(Self::Decelerate),
            5 => Some(Self::EmergencyBrake),
            _ => None,
        }
    }

    /// The numeric encoding of the action.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this is one of the two lane-change actions.
    pub fn is_lane_change(self) -> bool {
        matches!(self, Self::ChangeLaneLeft | Self::ChangeLaneRight)
    }
}
