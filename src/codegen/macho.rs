//! Minimal Mach-O executable: 64-bit header, `__TEXT` and `__DATA` segment
//! commands with one section each, and an `LC_MAIN` entry point at file
//! offset 0xf50.

use super::buffer::ByteBuffer;

pub const MAGIC: u32 = 0xfeed_facf;

const CPU_TYPE_X86_64: u32 = 0x0100_0007;
const CPU_TYPE_ARM64: u32 = 0x0100_000c;

/// exit(0) through the BSD syscall interface.
const PLACEHOLDER_X86_64: &[u8] = &[
    0x48, 0xc7, 0xc0, 0x01, 0x00, 0x00, 0x02, // mov rax, 0x2000001
    0x48, 0xc7, 0xc7, 0x00, 0x00, 0x00, 0x00, // mov rdi, 0
    0x0f, 0x05, // syscall
    0xc3, // ret
];

const PLACEHOLDER_ARM64: &[u8] = &[
    0x00, 0x00, 0x80, 0xd2, // mov x0, #0
    0x01, 0x00, 0x00, 0xd4, // svc #0
    0xc0, 0x03, 0x5f, 0xd6, // ret
];

pub fn write(machine_code: &[u8], arm64: bool) -> Vec<u8> {
    let code: &[u8] = if machine_code.is_empty() {
        if arm64 {
            PLACEHOLDER_ARM64
        } else {
            PLACEHOLDER_X86_64
        }
    } else {
        machine_code
    };

    let mut buffer = ByteBuffer::new();

    // Mach header
    buffer.put_u32(MAGIC);
    if arm64 {
        buffer.put_u32(CPU_TYPE_ARM64);
        buffer.put_u32(0); // CPU_SUBTYPE_ARM64_ALL
    } else {
        buffer.put_u32(CPU_TYPE_X86_64);
        buffer.put_u32(3); // CPU_SUBTYPE_X86_64_ALL
    }
    buffer.put_u32(2); // MH_EXECUTE
    buffer.put_u32(3); // load command count
    buffer.put_u32(0x1c8); // load command bytes
    buffer.put_u32(0x0020_0085); // NOUNDEFS | DYLDLINK | TWOLEVEL
    buffer.put_u32(0); // reserved

    // LC_SEGMENT_64 __TEXT
    buffer.put_u32(0x19);
    buffer.put_u32(0x98);
    buffer.put_padded_name("__TEXT", 16);
    buffer.put_u64(0x1_0000_0000); // vm address
    buffer.put_u64(0x1000); // vm size
    buffer.put_u64(0); // file offset
    buffer.put_u64(0x1000); // file size
    buffer.put_u32(7); // max RWX
    buffer.put_u32(5); // init RX
    buffer.put_u32(1); // one section
    buffer.put_u32(0);

    // __TEXT,__text
    buffer.put_padded_name("__text", 16);
    buffer.put_padded_name("__TEXT", 16);
    buffer.put_u64(0x1_0000_0f50); // address
    buffer.put_u64(0x20); // size
    buffer.put_u32(0xf50); // offset
    buffer.put_u32(4); // 2^4 alignment
    buffer.put_u32(0); // relocation offset
    buffer.put_u32(0); // relocation count
    buffer.put_u32(0x8000_0400); // S_REGULAR | PURE_INSTRUCTIONS
    buffer.put_u32(0);
    buffer.put_u32(0);
    buffer.put_u32(0);

    // LC_SEGMENT_64 __DATA
    buffer.put_u32(0x19);
    buffer.put_u32(0x98);
    buffer.put_padded_name("__DATA", 16);
    buffer.put_u64(0x1_0000_1000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x1000);
    buffer.put_u32(7); // max RWX
    buffer.put_u32(3); // init RW
    buffer.put_u32(1);
    buffer.put_u32(0);

    // __DATA,__data
    buffer.put_padded_name("__data", 16);
    buffer.put_padded_name("__DATA", 16);
    buffer.put_u64(0x1_0000_1000);
    buffer.put_u64(0x20);
    buffer.put_u32(0x1000);
    buffer.put_u32(3); // 2^3 alignment
    buffer.put_u32(0);
    buffer.put_u32(0);
    buffer.put_u32(0); // S_REGULAR
    buffer.put_u32(0);
    buffer.put_u32(0);
    buffer.put_u32(0);

    // LC_MAIN
    buffer.put_u32(0x8000_0028);
    buffer.put_u32(0x18);
    buffer.put_u64(0xf50); // entry offset
    buffer.put_u64(0); // default stack size

    buffer.pad_to(0xf50);
    buffer.put_bytes(code);

    buffer.pad_to(0x1000);
    buffer.write_at(0x1000, b"Hello, World from GDScript on macOS!\n\0");

    buffer.into_bytes()
}
