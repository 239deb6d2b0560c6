//! Friend-relationship protocol
//!
//! ```text
//!                 add_friend                 accept_friend (by target)
//!  NOT_FRIEND ─────────────────► PENDING ────────────────────────────► MUTUAL
//!      ▲                        (outgoing /                              │
//!      │                         incoming)                               │
//!      │         reject_friend /     │                    remove_friend  │
//!      └──────── clear_friend_request┘                                   ▼
//!                                                                     REMOVED
//! ```
//!
//! Every check is a read against the shared store and every change is a
//! short saga of independently acknowledged writes. The other side may act
//! concurrently; operations tolerate finding the work already done.

mod protocol;
mod saga;
mod state;

pub use saga::{Compensation, Saga};
pub use state::{EdgeState, FriendshipState, RelationshipFacts};
