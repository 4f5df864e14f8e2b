//! Well-known opcode table shared with the game server.
//!
//! The transport core treats opcodes as opaque `u16` values; this table only
//! names them and assigns each the payload schema used when building an
//! [`Envelope`](super::envelope::Envelope).

// Authentication & account
pub const CMD_HEARTBEAT: u16 = 0x0001;
pub const CMD_LOGIN_REQ: u16 = 0x0100;
pub const CMD_REGISTER_REQ: u16 = 0x0101;
pub const CMD_LOGOUT_REQ: u16 = 0x0102;
pub const CMD_RECONNECT: u16 = 0x0103;

// Lobby
pub const CMD_CREATE_ROOM: u16 = 0x0200;
pub const CMD_JOIN_ROOM: u16 = 0x0201;
pub const CMD_LEAVE_ROOM: u16 = 0x0202;
pub const CMD_READY: u16 = 0x0203;
pub const CMD_KICK: u16 = 0x0204;
pub const CMD_INVITE_FRIEND: u16 = 0x0205;
pub const CMD_SET_RULE: u16 = 0x0206;
pub const CMD_CLOSE_ROOM: u16 = 0x0207;
pub const CMD_GET_ROOM_STATE: u16 = 0x0208;

// Gameplay
pub const CMD_START_GAME: u16 = 0x0300;
pub const CMD_ANSWER_QUIZ: u16 = 0x0301;
pub const CMD_BID: u16 = 0x0302;
pub const CMD_SPIN: u16 = 0x0303;
pub const CMD_FORFEIT: u16 = 0x0304;
pub const CMD_BONUS: u16 = 0x0305;

// Social & history
pub const CMD_CHAT: u16 = 0x0500;
pub const CMD_FRIEND_ADD: u16 = 0x0501;
pub const CMD_HIST: u16 = 0x0502;
pub const CMD_REPLAY: u16 = 0x0503;
pub const CMD_LEAD: u16 = 0x0504;

// Responses
pub const RES_SUCCESS: u16 = 200;
pub const RES_LOGIN_OK: u16 = 201;
pub const RES_HEARTBEAT_OK: u16 = 210;
pub const RES_ROOM_CREATED: u16 = 220;
pub const RES_ROOM_JOINED: u16 = 221;
pub const RES_ROOM_LEFT: u16 = 222;
pub const RES_ROOM_CLOSED: u16 = 223;
pub const RES_RULES_UPDATED: u16 = 224;
pub const RES_MEMBER_KICKED: u16 = 225;
pub const RES_ROOM_STATE: u16 = 226;
pub const RES_GAME_STARTED: u16 = 301;

// Errors
pub const ERR_BAD_REQUEST: u16 = 400;
pub const ERR_NOT_LOGGED_IN: u16 = 401;
pub const ERR_INVALID_USERNAME: u16 = 402;
pub const ERR_ROOM_FULL: u16 = 403;
pub const ERR_GAME_STARTED: u16 = 404;
pub const ERR_PAYLOAD_LARGE: u16 = 405;
pub const ERR_NOT_HOST: u16 = 406;
pub const ERR_TIMEOUT: u16 = 408;
pub const ERR_SERVER_ERROR: u16 = 500;
pub const ERR_SERVICE_UNAVAILABLE: u16 = 501;

// Server-push notifications
pub const NTF_PLAYER_JOINED: u16 = 700;
pub const NTF_PLAYER_LEFT: u16 = 701;
pub const NTF_PLAYER_LIST: u16 = 702;
pub const NTF_ROUND_START: u16 = 703;
pub const NTF_ROUND_END: u16 = 704;
pub const NTF_SCOREBOARD: u16 = 705;
pub const NTF_ELIMINATION: u16 = 706;
pub const NTF_GAME_END: u16 = 707;
pub const NTF_GAME_START: u16 = 708;
pub const NTF_CHAT_MSG: u16 = 710;
pub const NTF_INVITATION: u16 = 711;
pub const NTF_PLAYER_READY: u16 = 712;
pub const NTF_RULES_CHANGED: u16 = 713;
pub const NTF_MEMBER_KICKED: u16 = 714;
pub const NTF_ROOM_CLOSED: u16 = 715;

const ERRORS: [u16; 10] = [
    ERR_BAD_REQUEST,
    ERR_NOT_LOGGED_IN,
    ERR_INVALID_USERNAME,
    ERR_ROOM_FULL,
    ERR_GAME_STARTED,
    ERR_PAYLOAD_LARGE,
    ERR_NOT_HOST,
    ERR_TIMEOUT,
    ERR_SERVER_ERROR,
    ERR_SERVICE_UNAVAILABLE,
];

/// How an opcode's payload is decoded at the dispatch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSchema {
    /// No payload expected
    Empty,
    /// UTF-8 JSON document
    Json,
    /// `room_id: u32` big-endian followed by an 8-byte NUL-padded room code
    RoomCreated,
    /// Unknown opcode; bytes are passed through untouched
    Raw,
}

/// Payload schema for `opcode`.
pub fn schema(opcode: u16) -> PayloadSchema {
    match opcode {
        CMD_HEARTBEAT | RES_HEARTBEAT_OK => PayloadSchema::Empty,
        RES_ROOM_CREATED => PayloadSchema::RoomCreated,
        op if name(op).is_some() => PayloadSchema::Json,
        _ => PayloadSchema::Raw,
    }
}

/// Whether `opcode` is one of the server's error responses.
pub fn is_error(opcode: u16) -> bool {
    ERRORS.contains(&opcode)
}

/// Symbolic name for logging.
pub fn name(opcode: u16) -> Option<&'static str> {
    let name = match opcode {
        CMD_HEARTBEAT => "CMD_HEARTBEAT",
        CMD_LOGIN_REQ => "CMD_LOGIN_REQ",
        CMD_REGISTER_REQ => "CMD_REGISTER_REQ",
        CMD_LOGOUT_REQ => "CMD_LOGOUT_REQ",
        CMD_RECONNECT => "CMD_RECONNECT",
        CMD_CREATE_ROOM => "CMD_CREATE_ROOM",
        CMD_JOIN_ROOM => "CMD_JOIN_ROOM",
        CMD_LEAVE_ROOM => "CMD_LEAVE_ROOM",
        CMD_READY => "CMD_READY",
        CMD_KICK => "CMD_KICK",
        CMD_INVITE_FRIEND => "CMD_INVITE_FRIEND",
        CMD_SET_RULE => "CMD_SET_RULE",
        CMD_CLOSE_ROOM => "CMD_CLOSE_ROOM",
        CMD_GET_ROOM_STATE => "CMD_GET_ROOM_STATE",
        CMD_START_GAME => "CMD_START_GAME",
        CMD_ANSWER_QUIZ => "CMD_ANSWER_QUIZ",
        CMD_BID => "CMD_BID",
        CMD_SPIN => "CMD_SPIN",
        CMD_FORFEIT => "CMD_FORFEIT",
        CMD_BONUS => "CMD_BONUS",
        CMD_CHAT => "CMD_CHAT",
        CMD_FRIEND_ADD => "CMD_FRIEND_ADD",
        CMD_HIST => "CMD_HIST",
        CMD_REPLAY => "CMD_REPLAY",
        CMD_LEAD => "CMD_LEAD",
        RES_SUCCESS => "RES_SUCCESS",
        RES_LOGIN_OK => "RES_LOGIN_OK",
        RES_HEARTBEAT_OK => "RES_HEARTBEAT_OK",
        RES_ROOM_CREATED => "RES_ROOM_CREATED",
        RES_ROOM_JOINED => "RES_ROOM_JOINED",
        RES_ROOM_LEFT => "RES_ROOM_LEFT",
        RES_ROOM_CLOSED => "RES_ROOM_CLOSED",
        RES_RULES_UPDATED => "RES_RULES_UPDATED",
        RES_MEMBER_KICKED => "RES_MEMBER_KICKED",
        RES_ROOM_STATE => "RES_ROOM_STATE",
        RES_GAME_STARTED => "RES_GAME_STARTED",
        ERR_BAD_REQUEST => "ERR_BAD_REQUEST",
        ERR_NOT_LOGGED_IN => "ERR_NOT_LOGGED_IN",
        ERR_INVALID_USERNAME => "ERR_INVALID_USERNAME",
        ERR_ROOM_FULL => "ERR_ROOM_FULL",
        ERR_GAME_STARTED => "ERR_GAME_STARTED",
        ERR_PAYLOAD_LARGE => "ERR_PAYLOAD_LARGE",
        ERR_NOT_HOST => "ERR_NOT_HOST",
        ERR_TIMEOUT => "ERR_TIMEOUT",
        ERR_SERVER_ERROR => "ERR_SERVER_ERROR",
        ERR_SERVICE_UNAVAILABLE => "ERR_SERVICE_UNAVAILABLE",
        NTF_PLAYER_JOINED => "NTF_PLAYER_JOINED",
        NTF_PLAYER_LEFT => "NTF_PLAYER_LEFT",
        NTF_PLAYER_LIST => "NTF_PLAYER_LIST",
        NTF_ROUND_START => "NTF_ROUND_START",
        NTF_ROUND_END => "NTF_ROUND_END",
        NTF_SCOREBOARD => "NTF_SCOREBOARD",
        NTF_ELIMINATION => "NTF_ELIMINATION",
        NTF_GAME_END => "NTF_GAME_END",
        NTF_GAME_START => "NTF_GAME_START",
        NTF_CHAT_MSG => "NTF_CHAT_MSG",
        NTF_INVITATION => "NTF_INVITATION",
        NTF_PLAYER_READY => "NTF_PLAYER_READY",
        NTF_RULES_CHANGED => "NTF_RULES_CHANGED",
        NTF_MEMBER_KICKED => "NTF_MEMBER_KICKED",
        NTF_ROOM_CLOSED => "NTF_ROOM_CLOSED",
        _ => return None,
    };
    Some(name)
}

/// `NAME (0xNNNN)` for known opcodes, `0xNNNN` otherwise.
pub fn describe(opcode: u16) -> String {
    match name(opcode) {
        Some(name) => format!("{name} (0x{opcode:04X})"),
        None => format!("0x{opcode:04X}"),
    }
}
