//! StartupMessage.

use crate::protocol::codec::MessageBuilder;

/// Protocol 3.0, sent as the first field of the startup packet.
pub const PROTOCOL_VERSION_3_0: i32 = 196608;

/// Append a StartupMessage with the given parameters.
///
/// The startup packet has no type byte: a self-inclusive length, the protocol
/// version, NUL-terminated name/value pairs and a final zero byte.
pub fn write_startup(buf: &mut Vec<u8>, params: &[(&str, &str)]) {
    let mut msg = MessageBuilder::new_startup(buf);
    msg.write_i32(PROTOCOL_VERSION_3_0);
    for (name, value) in params {
        msg.write_cstr(name);
        msg.write_cstr(value);
    }
    msg.write_u8(0);
    msg.finish();
}
