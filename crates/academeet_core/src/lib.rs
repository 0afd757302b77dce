pub mod booking;
pub mod cancellation;
pub mod domain;
pub mod ports;
pub mod projection;
pub mod schedule;

pub use domain::{
    Caller, ConsultationWindow, NewUser, NewWindow, Role, Slot, SlotInterval, SlotOffer,
    SlotStatus, User, UserCredentials,
};
pub use ports::{DatabaseService, PortError, PortResult};
pub use projection::{ChangeOp, SlotBoard, SlotEvent};
