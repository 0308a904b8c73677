//! Minimal ELF executable: 64-byte header, two loadable program headers
//! (code RX at 0x400000, data RW at 0x401000), code at file offset 0x1000,
//! and four section headers at 0x2000. The data segment shares file offset
//! 0x1000 with the code region.

use super::buffer::ByteBuffer;

pub const MAGIC: &[u8; 4] = b"\x7fELF";

const EM_X86_64: u16 = 62;
const EM_AARCH64: u16 = 183;

/// write(1, msg, len) then exit(0) via Linux syscalls.
const PLACEHOLDER_X86_64: &[u8] = &[
    0x48, 0xc7, 0xc0, 0x01, 0x00, 0x00, 0x00, // mov rax, 1 (sys_write)
    0x48, 0xc7, 0xc7, 0x01, 0x00, 0x00, 0x00, // mov rdi, 1 (stdout)
    0x48, 0xc7, 0xc6, 0x00, 0x10, 0x40, 0x00, // mov rsi, 0x401000
    0x48, 0xc7, 0xc2, 0x26, 0x00, 0x00, 0x00, // mov rdx, 38
    0x0f, 0x05, // syscall
    0x48, 0xc7, 0xc0, 0x3c, 0x00, 0x00, 0x00, // mov rax, 60 (sys_exit)
    0x48, 0xc7, 0xc7, 0x00, 0x00, 0x00, 0x00, // mov rdi, 0
    0x0f, 0x05, // syscall
];

const PLACEHOLDER_ARM64: &[u8] = &[
    0x00, 0x00, 0x80, 0xd2, // mov x0, #0
    0x21, 0x00, 0x80, 0xd2, // mov x1, #1
    0x42, 0x00, 0x80, 0xd2, // mov x2, #2
    0x08, 0x08, 0x80, 0xd2, // mov x8, #64 (sys_write)
    0x01, 0x00, 0x00, 0xd4, // svc #0
    0x00, 0x00, 0x80, 0xd2, // mov x0, #0
    0xa8, 0x0b, 0x80, 0xd2, // mov x8, #93 (sys_exit)
    0x01, 0x00, 0x00, 0xd4, // svc #0
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

    // ELF header
    buffer.put_bytes(MAGIC);
    buffer.put_u8(2); // ELFCLASS64
    buffer.put_u8(1); // little endian
    buffer.put_u8(1); // EV_CURRENT
    buffer.put_u8(0); // System V ABI
    buffer.put_bytes(&[0; 8]); // padding
    buffer.put_u16(2); // ET_EXEC
    buffer.put_u16(if arm64 { EM_AARCH64 } else { EM_X86_64 });
    buffer.put_u32(1); // EV_CURRENT
    buffer.put_u64(0x40_1000); // entry point
    buffer.put_u64(64); // program header offset
    buffer.put_u64(0x2000); // section header offset
    buffer.put_u32(0); // flags
    buffer.put_u16(64); // ELF header size
    buffer.put_u16(56); // program header entry size
    buffer.put_u16(2); // program header count
    buffer.put_u16(64); // section header entry size
    buffer.put_u16(4); // section header count
    buffer.put_u16(3); // string table index

    // PT_LOAD code, RX
    buffer.put_u32(1);
    buffer.put_u32(5);
    buffer.put_u64(0);
    buffer.put_u64(0x40_0000);
    buffer.put_u64(0x40_0000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x1000);

    // PT_LOAD data, RW
    buffer.put_u32(1);
    buffer.put_u32(6);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x40_1000);
    buffer.put_u64(0x40_1000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x1000);

    buffer.pad_to(0x1000);
    buffer.put_bytes(code);

    // Data content lands at the data segment's file offset.
    buffer.write_at(0x1000, b"Hello, World from GDScript on Linux!\n\0");

    buffer.pad_to(0x2000);

    // SHT_NULL
    for _ in 0..8 {
        buffer.put_u64(0);
    }

    // .text
    buffer.put_u32(1); // name offset
    buffer.put_u32(1); // SHT_PROGBITS
    buffer.put_u64(6); // ALLOC | EXECINSTR
    buffer.put_u64(0x40_1000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x40);
    buffer.put_u32(0);
    buffer.put_u32(0);
    buffer.put_u64(16);
    buffer.put_u64(0);

    // .data
    buffer.put_u32(7);
    buffer.put_u32(1); // SHT_PROGBITS
    buffer.put_u64(3); // ALLOC | WRITE
    buffer.put_u64(0x40_2000);
    buffer.put_u64(0x1000);
    buffer.put_u64(0x40);
    buffer.put_u32(0);
    buffer.put_u32(0);
    buffer.put_u64(8);
    buffer.put_u64(0);

    // .shstrtab
    buffer.put_u32(13);
    buffer.put_u32(3); // SHT_STRTAB
    buffer.put_u64(0);
    buffer.put_u64(0);
    buffer.put_u64(0x2100);
    buffer.put_u64(0x23);
    buffer.put_u32(0);
    buffer.put_u32(0);
    buffer.put_u64(1);
    buffer.put_u64(0);

    buffer.pad_to(0x2100);
    buffer.write_at(0x2100, b"\0.text\0.data\0.shstrtab\0");

    buffer.into_bytes()
}
