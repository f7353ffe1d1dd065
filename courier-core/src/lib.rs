//! Courier Core Library
//!
//! Transaction engine for carrier multimedia messaging. Executes individual
//! message transactions — sending an outbound message or downloading a
//! pending inbound one — over a registered carrier delivery service with
//! fallback to a direct network transfer, and reports a single result per
//! transaction back to the queue layer.

pub mod broadcast;
pub mod carrier;
pub mod config;
pub mod engine;
pub mod mock;
pub mod pdu;
pub mod policy;
pub mod sink;
pub mod store;
pub mod transaction;
pub mod transport;

pub use broadcast::{notify_all_eligible, AudienceContext, AudienceDirectory, BroadcastEvent};
pub use carrier::{
    CarrierBinding, CarrierCallback, CarrierChannel, CarrierJob, CarrierOutcome, CarrierStatus,
    ChannelAttempt,
};
pub use config::{ApnSettings, CarrierConfig, DEFAULT_MAX_MESSAGE_SIZE};
pub use engine::{Services, TransactionEngine};
pub use mock::{
    CountingEmergencyNotifier, CountingIdentityScope, MemoryStore, MockCarrierChannel,
    MockPersistPolicy, MockTransport, RecordedTransfer, RecordingSink, StaticAudience,
    StaticNumberPolicy, StaticSizeHints,
};
pub use pdu::{
    AddressField, Pdu, PduError, ResponseStatus, RetrieveConfPdu, RetrieveStatus, SendConfPdu,
    SendRequestPdu,
};
pub use policy::{
    ElevatedIdentity, EmergencyContactNotifier, IdentityScope, NumberPolicy, PersistPolicy,
};
pub use sink::{ChannelSink, DeliveredResult, ResultCode, ResultSink};
pub use store::{MessageBox, MessageStore, MetadataUpdate, SqliteStore, StoreError, StoredMessage};
pub use transaction::{
    DownloadTransaction, PayloadSizeHints, SendTransaction, Transaction, TransactionContext,
    TransactionId, TransactionKind,
};
#[cfg(feature = "transport-http")]
pub use transport::HttpTransport;
pub use transport::{Method, ProxyConfig, TransportClient, TransportError};
