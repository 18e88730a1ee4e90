//! Messages sent once the session is established.

use crate::protocol::codec::MessageBuilder;

use super::msg_type;

/// Append a Query message carrying `sql`.
///
/// Several statements separated by `;` run as one implicit transaction and
/// their results arrive back to back before a single ReadyForQuery.
pub fn write_query(buf: &mut Vec<u8>, sql: &str) {
    let mut msg = MessageBuilder::new(buf, msg_type::QUERY);
    msg.write_cstr(sql);
    msg.finish();
}

/// Append a Terminate message. It has no payload.
pub fn write_terminate(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::TERMINATE).finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_frame() {
        let mut buf = Vec::new();
        write_query(&mut buf, "SELECT 1");

        let mut expected = vec![b'Q', 0, 0, 0, 13];
        expected.extend_from_slice(b"SELECT 1\0");
        assert_eq!(buf, expected);
    }

    #[test]
    fn empty_query_is_just_the_terminator() {
        let mut buf = Vec::new();
        write_query(&mut buf, "");
        assert_eq!(buf, [b'Q', 0, 0, 0, 5, 0]);
    }

    #[test]
    fn messages_append() {
        let mut buf = vec![0xAA];
        write_query(&mut buf, "x");
        write_terminate(&mut buf);
        assert_eq!(buf, [0xAA, b'Q', 0, 0, 0, 6, b'x', 0, b'X', 0, 0, 0, 4]);
    }
}
