//! Miscellaneous utility functions to use across modules

/// Print a byte buffer as a series of hex bytes
pub fn print_buffer(buffer: &[u8]) {
    for byte in buffer {
        print!("{:#X} ", byte);
    }
    println!();
}

/// Format a byte buffer like `xxd`, 16 bytes per row.
/// `offset` is the address of the first byte, shown in the left column.
pub fn format_multiline_buffer(buffer: &[u8], offset: usize) -> String {
    let mut out = String::new();
    for (row, chunk) in buffer.chunks(16).enumerate() {
        out.push_str(&format!("{:08X}:", offset + row * 16));
        for (i, byte) in chunk.iter().enumerate() {
            if i % 2 == 0 {
                out.push(' ');
            }
            out.push_str(&format!("{:02x}", byte));
        }
        // Pad short last row so the ASCII column lines up
        for i in chunk.len()..16 {
            if i % 2 == 0 {
                out.push(' ');
            }
            out.push_str("  ");
        }
        out.push_str("  ");
        for byte in chunk {
            let c = *byte as char;
            out.push(if c.is_ascii_graphic() || c == ' ' { c } else { '.' });
        }
        out.push('\n');
    }
    out
}

pub fn print_multiline_buffer(buffer: &[u8], offset: usize) {
    print!("{}", format_multiline_buffer(buffer, offset));
}
