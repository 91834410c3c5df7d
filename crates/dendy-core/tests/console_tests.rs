//! End-to-end console tests over hand-assembled iNES images.

use dendy_core::Console;
use dendy_cpu::Bus as CpuBus;
use dendy_ppu::NES_PALETTE;

/// Build an iNES image with `program` at $8000, an optional interrupt
/// handler at $9000 (wired to both the NMI and IRQ vectors), and the
/// RESET vector pointing at $8000.
fn build_rom(mapper: u8, prg_banks: u8, chr_banks: u8, program: &[u8], handler: &[u8]) -> Vec<u8> {
    let mut data = vec![
        0x4E,
        0x45,
        0x53,
        0x1A,
        prg_banks,
        chr_banks,
        mapper << 4,
        mapper & 0xF0,
    ];
    data.extend_from_slice(&[0; 8]);

    let prg_size = usize::from(prg_banks) * 0x4000;
    let mut prg = vec![0u8; prg_size];
    prg[..program.len()].copy_from_slice(program);
    prg[0x1000..0x1000 + handler.len()].copy_from_slice(handler);
    // Vectors live in the last 6 bytes, reachable through every
    // mapper's fixed top bank: NMI -> $9000, RESET -> $8000, IRQ -> $9000.
    let v = prg_size - 6;
    prg[v..].copy_from_slice(&[0x00, 0x90, 0x00, 0x80, 0x00, 0x90]);
    data.extend_from_slice(&prg);

    data.extend(std::iter::repeat(0).take(usize::from(chr_banks) * 0x2000));
    data
}

/// `INC $10; RTI` - counts interrupt deliveries in zero page.
const COUNT_HANDLER: &[u8] = &[0xE6, 0x10, 0x40];

/// `JMP $8000` - the idle loop.
const IDLE: &[u8] = &[0x4C, 0x00, 0x80];

#[test]
fn uniform_backdrop_frame() {
    // Write $3F00 = $21 with rendering left off; every visible pixel of
    // the next full frame is the backdrop color.
    let program = [
        0xA9, 0x3F, // LDA #$3F
        0x8D, 0x06, 0x20, // STA $2006
        0xA9, 0x00, // LDA #$00
        0x8D, 0x06, 0x20, // STA $2006
        0xA9, 0x21, // LDA #$21
        0x8D, 0x07, 0x20, // STA $2007
        0x4C, 0x0F, 0x80, // JMP $800F
    ];
    let rom = build_rom(0, 2, 1, &program, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    // The PPU wakes mid-frame, so let the short first frame pass.
    assert!(console.step_until_frame());
    assert!(console.step_until_frame());

    let expected = NES_PALETTE[0x21];
    assert!(console.frame().iter().all(|&px| px == expected));
}

#[test]
fn nmi_reaches_the_handler_every_frame() {
    let program = [
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x20, // STA $2000 (NMI on)
        0x4C, 0x05, 0x80, // JMP $8005
    ];
    let rom = build_rom(0, 2, 1, &program, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    for _ in 0..4 {
        assert!(console.step_until_frame());
    }
    let count = console.bus().ram[0x10];
    assert!((3..=4).contains(&count), "NMI count {count}");
}

#[test]
fn oam_dma_copies_a_page_and_stalls() {
    let rom = build_rom(0, 2, 1, IDLE, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    let bus = console.bus_mut();
    for i in 0..256u16 {
        CpuBus::write(bus, 0x0200 + i, i as u8);
    }
    CpuBus::write(bus, 0x2003, 0x10); // OAM cursor off zero
    CpuBus::write(bus, 0x4014, 0x02);

    console.step();

    let oam = console.bus().ppu.oam();
    for i in 0..256usize {
        assert_eq!(oam[(0x10 + i) % 256], i as u8, "byte {i}");
    }
    // 513 or 514 stall cycles were charged; one was burned by the step.
    let stall = console.cpu().stall;
    assert!((512..=513).contains(&stall), "stall {stall}");
}

#[test]
fn audio_arrives_at_frame_pace() {
    let rom = build_rom(0, 2, 1, IDLE, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    console.step_until_frame();
    console.take_audio();
    console.step_until_frame();
    let samples = console.take_audio();
    // One NTSC frame at 48 kHz is ~800 samples.
    assert!(
        (780..=820).contains(&samples.len()),
        "{} samples",
        samples.len()
    );
}

#[test]
fn target_frame_stops_the_loop() {
    let rom = build_rom(0, 2, 1, IDLE, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    console.set_target_frame(Some(3)).unwrap();
    let mut produced = 0;
    while console.step_until_frame() {
        produced += 1;
        assert!(produced < 10, "target never reached");
    }
    assert_eq!(console.frame_count(), 3);
}

#[test]
fn stale_target_frame_is_rejected() {
    let rom = build_rom(0, 2, 1, IDLE, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    console.step_until_frame();
    console.step_until_frame();
    assert!(console.set_target_frame(Some(0)).is_err());
    assert!(console.set_target_frame(None).is_ok());
}

#[test]
fn dmc_drains_a_one_byte_sample() {
    let rom = build_rom(0, 2, 1, IDLE, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    let bus = console.bus_mut();
    CpuBus::write(bus, 0x4012, 0x00); // sample at $C000
    CpuBus::write(bus, 0x4013, 0x00); // length 1 byte
    CpuBus::write(bus, 0x4010, 0x0F); // fastest rate
    CpuBus::write(bus, 0x4015, 0x10); // enable DMC
    assert_eq!(CpuBus::read(bus, 0x4015) & 0x10, 0x10);

    for _ in 0..16 {
        console.step();
    }
    assert_eq!(
        CpuBus::read(console.bus_mut(), 0x4015) & 0x10,
        0x00,
        "DMC still reports bytes remaining"
    );
}

#[test]
fn mmc3_scanline_irq_reaches_the_handler() {
    let program = [
        0xA9, 0x08, // LDA #$08
        0x8D, 0x01, 0x20, // STA $2001 (show background)
        0xA9, 0x05, // LDA #$05
        0x8D, 0x00, 0xC0, // STA $C000 (reload = 5)
        0x8D, 0x01, 0xC0, // STA $C001 (force reload)
        0x8D, 0x01, 0xE0, // STA $E001 (IRQ on)
        0x58, // CLI
        0x4C, 0x11, 0x80, // JMP $8011
    ];
    let rom = build_rom(4, 8, 2, &program, COUNT_HANDLER);
    let mut console = Console::new(&rom).unwrap();

    for _ in 0..3 {
        console.step_until_frame();
    }
    assert!(console.bus().ram[0x10] >= 1, "IRQ never delivered");
}

#[test]
fn load_rom_swaps_the_machine() {
    let rom_a = build_rom(0, 2, 1, IDLE, COUNT_HANDLER);
    let rom_b = build_rom(2, 4, 0, IDLE, COUNT_HANDLER);
    let mut console = Console::new(&rom_a).unwrap();
    console.step_until_frame();

    console.load_rom(&rom_b).unwrap();
    assert_eq!(console.frame_count(), 0);
    assert_eq!(console.cpu().pc, 0x8000);

    // A broken image leaves the running machine alone.
    assert!(console.load_rom(&[0u8; 4]).is_err());
    assert_eq!(console.cpu().pc, 0x8000);
}
