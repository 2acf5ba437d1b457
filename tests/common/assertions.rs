//! Custom assertion macros

/// Assert that a received event has the given type and chatroom
#[macro_export]
macro_rules! assert_event {
    ($event:expr, $kind:expr) => {{
        let event = $event;
        assert_eq!(event.kind, $kind, "unexpected event: {:?}", event);
    }};
    ($event:expr, $kind:expr, $room:expr) => {{
        let event = $event;
        assert_eq!(event.kind, $kind, "unexpected event: {:?}", event);
        assert_eq!(event.chatroom_id.as_deref(), Some($room), "wrong chatroom: {:?}", event);
    }};
}
