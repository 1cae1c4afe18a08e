//! Shared, observable DTLS session properties
//!
//! A control object, its transform engine and its packet transformer all
//! read the same handful of session properties (negotiated setup role,
//! transport connector, media type, rtcp-mux). `Properties` is the shared
//! store: writes fire change notifications synchronously on the writer's
//! thread so dependents can react before the next packet is processed.

use std::net::SocketAddr;

use parking_lot::RwLock;

/// DTLS setup role from the SDP "setup" attribute (RFC 5763)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setup {
    /// Endpoint initiates the handshake (DTLS client)
    Active,

    /// Endpoint awaits the handshake (DTLS server)
    Passive,
}

/// Media type the session transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Audio media
    Audio,

    /// Video media
    Video,
}

/// Property names passed to change listeners
pub mod property {
    /// Setup role changed
    pub const SETUP: &str = "setup";

    /// Transport connector changed
    pub const CONNECTOR: &str = "connector";

    /// Media type changed
    pub const MEDIA_TYPE: &str = "media-type";

    /// rtcp-mux flag changed
    pub const RTCP_MUX: &str = "rtcp-mux";
}

#[derive(Default)]
struct Values {
    setup: Option<Setup>,
    connector: Option<SocketAddr>,
    media_type: Option<MediaType>,
    rtcp_mux: bool,
}

type ChangeListener = Box<dyn Fn(&'static str) + Send + Sync>;

/// Observable property bag shared across the DTLS stack
pub struct Properties {
    /// Whether SRTP is disabled for this session; immutable per instance
    srtp_disabled: bool,

    values: RwLock<Values>,
    listeners: RwLock<Vec<ChangeListener>>,
}

impl Properties {
    /// Create a property bag; `srtp_disabled` cannot change afterwards
    pub fn new(srtp_disabled: bool) -> Self {
        Self {
            srtp_disabled,
            values: RwLock::new(Values::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Whether the session runs pure DTLS without SRTP
    pub fn is_srtp_disabled(&self) -> bool {
        self.srtp_disabled
    }

    /// Register a change listener, invoked synchronously on every write
    pub fn add_change_listener(&self, listener: ChangeListener) {
        self.listeners.write().push(listener);
    }

    /// The negotiated setup role
    pub fn setup(&self) -> Option<Setup> {
        self.values.read().setup
    }

    /// Set the setup role
    pub fn set_setup(&self, setup: Setup) {
        self.values.write().setup = Some(setup);
        self.notify(property::SETUP);
    }

    /// The transport connector address
    pub fn connector(&self) -> Option<SocketAddr> {
        self.values.read().connector
    }

    /// Set or clear the transport connector
    pub fn set_connector(&self, connector: Option<SocketAddr>) {
        self.values.write().connector = connector;
        self.notify(property::CONNECTOR);
    }

    /// The media type
    pub fn media_type(&self) -> Option<MediaType> {
        self.values.read().media_type
    }

    /// Set the media type
    pub fn set_media_type(&self, media_type: MediaType) {
        self.values.write().media_type = Some(media_type);
        self.notify(property::MEDIA_TYPE);
    }

    /// Whether RTP and RTCP share one transport
    pub fn rtcp_mux(&self) -> bool {
        self.values.read().rtcp_mux
    }

    /// Set the rtcp-mux flag
    pub fn set_rtcp_mux(&self, rtcp_mux: bool) {
        self.values.write().rtcp_mux = rtcp_mux;
        self.notify(property::RTCP_MUX);
    }

    /// Notify listeners after the write lock is released
    fn notify(&self, name: &'static str) {
        let listeners = self.listeners.read();
        for listener in listeners.iter() {
            listener(name);
        }
    }
}
