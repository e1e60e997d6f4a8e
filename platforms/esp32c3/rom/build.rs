// Licensed under the Apache-2.0 license.

use c3_config::ESP32C3_MEMORY_MAP;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let out_dir = env::var("OUT_DIR").unwrap_or_default();

    if arch == "riscv32" {
        let ld_script = generate_linker_script();
        let ld_file = PathBuf::from(&out_dir).join("c3-rom-layout.ld");

        let current_ld = fs::read_to_string(&ld_file).unwrap_or_default();
        if ld_script != current_ld {
            fs::write(&ld_file, &ld_script).unwrap();
        }

        println!("cargo:rustc-link-arg=-T{}", ld_file.display());
        println!("cargo:rerun-if-changed={}", ld_file.display());
    }
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/start.s");
}

fn generate_linker_script() -> String {
    let map = &ESP32C3_MEMORY_MAP;

    format!(
        r#"
/* Licensed under the Apache-2.0 license. */
/* ESP32-C3 boot ROM linker script - generated from c3-config */

ENTRY(_start)
OUTPUT_ARCH( "riscv" )

MEMORY
{{
  ROM  (rx) : ORIGIN = 0x{rom_offset:08x}, LENGTH = 0x{rom_size:x}
  RAM  (rw) : ORIGIN = 0x{ram_offset:08x}, LENGTH = 0x{ram_size:x}
}}

SECTIONS
{{
    .text :
    {{
        *(.text.init )
        *(.text*)
        *(.rodata*)
    }} > ROM

    ROM_DATA = .;

    .data : AT(ROM_DATA)
    {{
        . = ALIGN(4);
        *(.data*);
        *(.sdata*);
        KEEP(*(.eh_frame))
        . = ALIGN(4);
        PROVIDE( GLOBAL_POINTER = . + 0x800 );
        . = ALIGN(4);
    }} > RAM

    .bss (NOLOAD) :
    {{
        . = ALIGN(4);
        *(.bss*)
        *(.sbss*)
        *(COMMON)
        . = ALIGN(4);
    }} > RAM

    .stack (NOLOAD):
    {{
        . = ALIGN(16);
        . = . + STACK_SIZE;
        . = ALIGN(16);
        PROVIDE(STACK_START = . );
    }} > RAM

    _end = . ;
}}

BSS_START = ADDR(.bss);
BSS_END = BSS_START + SIZEOF(.bss);
DATA_START = ADDR(.data);
DATA_END = DATA_START + SIZEOF(.data);
ROM_DATA_START = LOADADDR(.data);
STACK_SIZE = 0x{stack_size:x};
STACK_TOP = ORIGIN(RAM) + LENGTH(RAM);
STACK_ORIGIN = STACK_TOP - STACK_SIZE;

"#,
        rom_offset = map.rom.start,
        rom_size = map.rom.size,
        ram_offset = map.rom_data.start,
        ram_size = map.rom_data.size,
        stack_size = map.rom_stack_size,
    )
}
