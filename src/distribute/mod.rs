//! Distribution side of the pipeline: canonical results out to chat groups.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`template`] | message templates rendered against canonical results |
//! | [`senders`] | platform delivery over Telegram and WhatsApp HTTP APIs |
//! | [`orchestrator`] | per-group filtering, rendering and outcome accounting |

pub mod orchestrator;
pub mod senders;
pub mod template;
