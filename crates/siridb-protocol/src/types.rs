//! Package type tags.
//!
//! Requests and responses use separate tag namespaces: tag `0` is a query
//! when sent by the client and a query result when sent by the server.
//! Server tags from `64` upward signal errors.

use crate::error::ProtocolError;

/// Type tag of a package sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestType {
    /// Run a query.
    Query = 0,
    /// Insert series data.
    Insert = 1,
    /// Authenticate against a database.
    Auth = 2,
    /// Keep-alive ping.
    Ping = 3,
    /// Request server info.
    Info = 4,
    /// Load a database (server to server).
    LoadDb = 5,
    /// Register a server (server to server).
    RegisterServer = 6,
    /// Request the servers file.
    FileServers = 7,
    /// Request the users file.
    FileUsers = 8,
    /// Request the groups file.
    FileGroups = 9,
    /// Service (admin) request.
    Admin = 32,
}

impl RequestType {
    /// Create a request type from a raw tag.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::Query),
            1 => Ok(Self::Insert),
            2 => Ok(Self::Auth),
            3 => Ok(Self::Ping),
            4 => Ok(Self::Info),
            5 => Ok(Self::LoadDb),
            6 => Ok(Self::RegisterServer),
            7 => Ok(Self::FileServers),
            8 => Ok(Self::FileUsers),
            9 => Ok(Self::FileGroups),
            32 => Ok(Self::Admin),
            _ => Err(ProtocolError::UnknownRequestType(value)),
        }
    }
}

impl From<RequestType> for u8 {
    fn from(tp: RequestType) -> Self {
        tp as u8
    }
}

/// Type tag of a package sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseType {
    /// Query result.
    Query = 0,
    /// Insert acknowledged.
    Insert = 1,
    /// Authentication succeeded.
    AuthSuccess = 2,
    /// Generic acknowledgement.
    Ack = 3,
    /// Server info.
    Info = 4,
    /// File content.
    File = 5,
    /// Admin request acknowledged.
    AckAdmin = 32,
    /// Admin request acknowledged with data.
    AckAdminData = 33,
    /// Generic error message.
    ErrMsg = 64,
    /// Query error.
    ErrQuery = 65,
    /// Insert error.
    ErrInsert = 66,
    /// Server error.
    ErrServer = 67,
    /// Pool error (no server available in a pool).
    ErrPool = 68,
    /// User has no access for the request.
    ErrUserAccess = 69,
    /// Unspecified error.
    Err = 70,
    /// Connection is not authenticated.
    ErrNotAuthenticated = 71,
    /// Invalid credentials.
    ErrAuthCredentials = 72,
    /// Unknown database.
    ErrAuthUnknownDb = 73,
    /// Database is still loading.
    ErrLoadingDb = 74,
    /// Error while reading a file.
    ErrFile = 75,
    /// Admin request failed.
    ErrAdmin = 96,
    /// Invalid admin request.
    ErrAdminInvalidRequest = 97,
}

impl ResponseType {
    /// Create a response type from a raw tag.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::Query),
            1 => Ok(Self::Insert),
            2 => Ok(Self::AuthSuccess),
            3 => Ok(Self::Ack),
            4 => Ok(Self::Info),
            5 => Ok(Self::File),
            32 => Ok(Self::AckAdmin),
            33 => Ok(Self::AckAdminData),
            64 => Ok(Self::ErrMsg),
            65 => Ok(Self::ErrQuery),
            66 => Ok(Self::ErrInsert),
            67 => Ok(Self::ErrServer),
            68 => Ok(Self::ErrPool),
            69 => Ok(Self::ErrUserAccess),
            70 => Ok(Self::Err),
            71 => Ok(Self::ErrNotAuthenticated),
            72 => Ok(Self::ErrAuthCredentials),
            73 => Ok(Self::ErrAuthUnknownDb),
            74 => Ok(Self::ErrLoadingDb),
            75 => Ok(Self::ErrFile),
            96 => Ok(Self::ErrAdmin),
            97 => Ok(Self::ErrAdminInvalidRequest),
            _ => Err(ProtocolError::UnknownResponseType(value)),
        }
    }

    /// Whether this tag signals an error.
    #[must_use]
    pub const fn is_error(self) -> bool {
        (self as u8) >= 64
    }
}

impl From<ResponseType> for u8 {
    fn from(tp: ResponseType) -> Self {
        tp as u8
    }
}

/// Describe a server response type tag.
///
/// Unknown tags map to a generic description rather than failing.
#[must_use]
pub fn errproto(tp: u8) -> &'static str {
    match ResponseType::from_u8(tp) {
        Ok(ResponseType::Query) => "query result",
        Ok(ResponseType::Insert) => "insert result",
        Ok(ResponseType::AuthSuccess) => "authentication successful",
        Ok(ResponseType::Ack) => "acknowledged",
        Ok(ResponseType::Info) => "server info",
        Ok(ResponseType::File) => "file content",
        Ok(ResponseType::AckAdmin) => "admin request acknowledged",
        Ok(ResponseType::AckAdminData) => "admin request acknowledged with data",
        Ok(ResponseType::ErrMsg) => "error message",
        Ok(ResponseType::ErrQuery) => "query error",
        Ok(ResponseType::ErrInsert) => "insert error",
        Ok(ResponseType::ErrServer) => "server error",
        Ok(ResponseType::ErrPool) => "no server available in pool",
        Ok(ResponseType::ErrUserAccess) => "user has no access",
        Ok(ResponseType::Err) => "unexpected error",
        Ok(ResponseType::ErrNotAuthenticated) => "connection is not authenticated",
        Ok(ResponseType::ErrAuthCredentials) => "invalid credentials",
        Ok(ResponseType::ErrAuthUnknownDb) => "unknown database",
        Ok(ResponseType::ErrLoadingDb) => "database is loading",
        Ok(ResponseType::ErrFile) => "error reading file",
        Ok(ResponseType::ErrAdmin) => "admin request failed",
        Ok(ResponseType::ErrAdminInvalidRequest) => "invalid admin request",
        Err(_) => "unknown package type",
    }
}
