mod packet;
mod peer;
mod route;

pub use packet::{ClientMessage, ErrorMessage, Event, FsmUpdate, InitData, Packet};
pub use peer::{CreateRequest, FsmState, PeerKey};
pub use route::{Nlri, RouteData};
