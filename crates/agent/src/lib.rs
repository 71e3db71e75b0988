//! Response orchestration for the WhatsApp customer-service assistant.
//!
//! One inbound message flows through:
//! 1. **Identity** (`identity`) - phone (and optional id) to a verified customer
//! 2. **Context** (`context`, `reference`) - only that customer's packages and
//!    balances, plus trips, rates, offices and phone-scoped history
//! 3. **Intent chain** (`intents`) - deterministic handlers, first match wins
//! 4. **Generation** (`generative`, `verifier`) - model reply, then a second
//!    model call that approves or corrects it
//! 5. **Emergency** (`emergency`) - templates when the model is unavailable
//! 6. **Recording** (`recorder`) - append-only interaction and learning notes
//!
//! `runtime::AssistantRuntime` sequences the stages and guarantees a single
//! reply per message.
//!
//! The model never chooses whose data it sees. Facts are selected in code
//! and handed to it already scoped to the verified customer.

pub mod context;
pub mod conversation;
pub mod emergency;
pub mod generative;
pub mod identity;
pub mod intents;
pub mod llm;
pub mod recorder;
pub mod reference;
pub mod runtime;
pub mod verifier;

pub use runtime::{
    AssistantRequest, AssistantResponse, AssistantRuntime, AssistantSettings, AssistantStores,
    CustomerInfo, PipelineStage,
};
