/// Protocol types: the wire envelope, its factory and the track id.
///
/// Nothing in here knows about transports or pending requests.
mod message;
mod track_id;

pub use message::{
    // ---
    create_command_message,
    create_event_message,
    create_message,
    create_message_from_dto,
    create_query_message,
    now_timestamp,
    Message,
    MessageDirection,
    MessageDto,
    MessageType,
    NewMessage,
};
pub use track_id::TrackId;
