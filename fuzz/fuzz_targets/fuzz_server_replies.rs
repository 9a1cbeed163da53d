#![no_main]

use libfuzzer_sys::fuzz_target;
use tidb_bootstrap::protocol::{
    decode_auth_reply, decode_column_definition, decode_command_reply, decode_handshake,
    decode_row,
};

fuzz_target!(|data: &[u8]| {
    let _ = decode_handshake(data);
    let _ = decode_auth_reply(data);
    let _ = decode_command_reply(data);
    let _ = decode_column_definition(data);

    let columns = data.first().map_or(0, |&b| usize::from(b % 16));
    let _ = decode_row(data, columns);
});
