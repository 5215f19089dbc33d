// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! I/O port stubs for the memory-mapped register windows this core does not
//! own (GPU, controller ports, timers, DMA channels, CD-ROM). Only the
//! interrupt controller (I_STAT/I_MASK) is backed by real state; everything
//! else returns the fixed idle value real hardware settles on when nothing
//! is driving the bus, so BIOS polling loops that probe these registers
//! during boot don't spin forever on a wrong answer.
//!
//! All I/O port operations are handled through 32-, 16- and 8-bit read/write
//! methods that route to the appropriate fixed address based on the physical
//! address.

use super::Bus;
use crate::core::error::Result;
use crate::core::event::{EmulatorEvent, EventLevel};

impl Bus {
    /// Split a DMA channel register address into (channel index, offset
    /// within the channel's 0x10-byte window).
    fn dma_channel_reg(paddr: u32) -> (usize, u32) {
        let rel = paddr - 0x1F801080;
        ((rel / 0x10) as usize, rel % 0x10)
    }

    /// Runs whenever `DPCR` is written: if two enabled channels (bit 3 of
    /// their 4-bit config nibble) share a priority (low 3 bits), real
    /// hardware's arbitration is undefined - this core treats it as a
    /// fatal host-visible condition instead of guessing.
    fn check_dma_priority_conflict(&self, dpcr: u32) {
        let mut owner: [Option<usize>; 8] = [None; 8];
        for channel in 0..7usize {
            let nibble = (dpcr >> (channel * 4)) & 0xF;
            if nibble & 0x8 == 0 {
                continue;
            }
            let priority = (nibble & 0x7) as usize;
            if let Some(other) = owner[priority] {
                log::error!(
                    "DMA priority conflict: channels {} and {} both at priority {}",
                    other,
                    channel,
                    priority
                );
                self.report_event(EmulatorEvent::LogMessage {
                    module_id: "dma",
                    level: EventLevel::Error,
                    text: format!(
                        "DMA channels {} and {} share priority {}",
                        other, channel, priority
                    ),
                });
            } else {
                owner[priority] = Some(channel);
            }
        }
    }

    /// Read from I/O port (32-bit)
    pub(super) fn read_io_port32(&self, paddr: u32) -> Result<u32> {
        match paddr {
            Self::GPU_GP0 => {
                log::trace!("GPUREAD stub read at 0x{:08X} -> 0x00000000", paddr);
                Ok(0)
            }
            Self::GPU_GP1 => {
                log::trace!("GPUSTAT stub read at 0x{:08X} -> 0x00000000", paddr);
                Ok(0)
            }
            Self::JOY_DATA => Ok(0xFF),
            Self::JOY_STAT => Ok(0x05), // TX ready, RX ready
            Self::JOY_MODE => Ok(0x000D),
            Self::JOY_CTRL => Ok(0),
            Self::JOY_BAUD => Ok(0),

            Self::I_STAT => {
                if let Some(interrupt_controller) = &self.interrupt_controller {
                    let value = interrupt_controller.borrow().read_status();
                    log::trace!("I_STAT read at 0x{:08X} -> 0x{:08X}", paddr, value);
                    Ok(value)
                } else {
                    log::warn!("I_STAT access before interrupt_controller initialized");
                    Ok(0)
                }
            }
            Self::I_MASK => {
                if let Some(interrupt_controller) = &self.interrupt_controller {
                    let value = interrupt_controller.borrow().read_mask();
                    log::trace!("I_MASK read at 0x{:08X} -> 0x{:08X}", paddr, value);
                    Ok(value)
                } else {
                    log::warn!("I_MASK access before interrupt_controller initialized");
                    Ok(0)
                }
            }

            // DMA channel registers (0x1F801080-0x1F8010EF)
            0x1F801080..=0x1F8010EF => {
                let (channel, offset) = Self::dma_channel_reg(paddr);
                let value = match offset {
                    0x0 => self.dma.madr[channel],
                    0x4 => self.dma.bcr[channel],
                    0x8 => self.dma.chcr[channel],
                    _ => 0,
                };
                log::trace!(
                    "DMA ch{} reg+0x{:X} read -> 0x{:08X}",
                    channel,
                    offset,
                    value
                );
                Ok(value)
            }
            Self::DMA_DPCR => Ok(self.dma.dpcr),
            Self::DMA_DICR => Ok(self.dma.dicr),

            Self::TIMER0_COUNTER | Self::TIMER0_MODE | Self::TIMER0_TARGET => Ok(0),
            Self::TIMER1_COUNTER | Self::TIMER1_MODE | Self::TIMER1_TARGET => Ok(0),
            Self::TIMER2_COUNTER | Self::TIMER2_MODE | Self::TIMER2_TARGET => Ok(0),

            _ => {
                log::info!("I/O port read at 0x{:08X}", paddr);
                Ok(0)
            }
        }
    }

    /// Write to I/O port (32-bit)
    pub(super) fn write_io_port32(&mut self, paddr: u32, value: u32) -> Result<()> {
        match paddr {
            Self::GPU_GP0 => {
                log::info!("GP0 write = 0x{:08X} (no GPU attached)", value);
                Ok(())
            }
            Self::GPU_GP1 => {
                log::info!("GP1 write = 0x{:08X} (no GPU attached)", value);
                Ok(())
            }
            Self::JOY_DATA | Self::JOY_MODE | Self::JOY_CTRL | Self::JOY_BAUD => Ok(()),

            Self::I_STAT => {
                if let Some(interrupt_controller) = &self.interrupt_controller {
                    interrupt_controller.borrow_mut().write_status(value);
                    log::trace!("I_STAT write at 0x{:08X} = 0x{:08X}", paddr, value);
                } else {
                    log::warn!("I_STAT write before interrupt_controller initialized");
                }
                Ok(())
            }
            Self::I_MASK => {
                if let Some(interrupt_controller) = &self.interrupt_controller {
                    interrupt_controller.borrow_mut().write_mask(value);
                    log::trace!("I_MASK write at 0x{:08X} = 0x{:08X}", paddr, value);
                } else {
                    log::warn!("I_MASK write before interrupt_controller initialized");
                }
                Ok(())
            }

            0x1F801080..=0x1F8010EF => {
                let (channel, offset) = Self::dma_channel_reg(paddr);
                match offset {
                    0x0 => self.dma.madr[channel] = value,
                    0x4 => self.dma.bcr[channel] = value,
                    0x8 => self.dma.chcr[channel] = value,
                    _ => {}
                }
                log::trace!(
                    "DMA ch{} reg+0x{:X} write = 0x{:08X}",
                    channel,
                    offset,
                    value
                );
                Ok(())
            }
            Self::DMA_DPCR => {
                self.dma.dpcr = value;
                self.check_dma_priority_conflict(value);
                Ok(())
            }
            Self::DMA_DICR => {
                self.dma.dicr = value;
                Ok(())
            }

            Self::TIMER0_COUNTER
            | Self::TIMER0_MODE
            | Self::TIMER0_TARGET
            | Self::TIMER1_COUNTER
            | Self::TIMER1_MODE
            | Self::TIMER1_TARGET
            | Self::TIMER2_COUNTER
            | Self::TIMER2_MODE
            | Self::TIMER2_TARGET => Ok(()),

            _ => {
                log::info!("I/O port write at 0x{:08X} = 0x{:08X}", paddr, value);
                Ok(())
            }
        }
    }

    /// Read from I/O port (8-bit)
    pub(super) fn read_io_port8(&self, paddr: u32) -> Result<u8> {
        match paddr {
            // CD-ROM status register: ready (parameter FIFO empty, not full)
            Self::CDROM_INDEX => Ok(0x18),
            Self::CDROM_REG1 | Self::CDROM_REG2 | Self::CDROM_REG3 => Ok(0),

            _ => {
                log::trace!("I/O port read8 at 0x{:08X}", paddr);
                Ok(0)
            }
        }
    }

    /// Write to I/O port (8-bit)
    pub(super) fn write_io_port8(&mut self, paddr: u32, value: u8) -> Result<()> {
        match paddr {
            Self::CDROM_INDEX | Self::CDROM_REG1 | Self::CDROM_REG2 | Self::CDROM_REG3 => {
                log::trace!(
                    "CD-ROM register stub write at 0x{:08X} = 0x{:02X}",
                    paddr,
                    value
                );
                Ok(())
            }

            _ => {
                log::trace!("I/O port write8 at 0x{:08X} = 0x{:02X}", paddr, value);
                Ok(())
            }
        }
    }

    /// Read from I/O port (16-bit)
    pub(super) fn read_io_port16(&self, paddr: u32) -> Result<u16> {
        match paddr {
            // SPU registers (0x1F801C00-0x1F801FFF)
            0x1F801C00..=0x1F801FFF => {
                log::trace!("SPU register stub read at 0x{:08X} -> 0x0000", paddr);
                Ok(0)
            }
            _ => {
                log::trace!("I/O port read16 at 0x{:08X} -> 0x0000", paddr);
                Ok(0)
            }
        }
    }

    /// Write to I/O port (16-bit)
    pub(super) fn write_io_port16(&mut self, paddr: u32, value: u16) -> Result<()> {
        match paddr {
            0x1F801C00..=0x1F801FFF => {
                log::trace!(
                    "SPU register stub write at 0x{:08X} = 0x{:04X}",
                    paddr,
                    value
                );
                Ok(())
            }
            _ => {
                log::trace!("I/O port write16 at 0x{:08X} = 0x{:04X}", paddr, value);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_read32_stub() {
        let bus = Bus::new();
        assert_eq!(bus.read_io_port32(Bus::GPU_GP0).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::GPU_GP1).unwrap(), 0);
    }

    #[test]
    fn test_gpu_write32_stub() {
        let mut bus = Bus::new();
        assert!(bus.write_io_port32(Bus::GPU_GP0, 0x12345678).is_ok());
        assert!(bus.write_io_port32(Bus::GPU_GP1, 0xABCDEF00).is_ok());
    }

    #[test]
    fn test_controller_read32_stub() {
        let bus = Bus::new();
        assert_eq!(bus.read_io_port32(Bus::JOY_DATA).unwrap(), 0xFF);
        assert_eq!(bus.read_io_port32(Bus::JOY_STAT).unwrap(), 0x05);
        assert_eq!(bus.read_io_port32(Bus::JOY_MODE).unwrap(), 0x000D);
        assert_eq!(bus.read_io_port32(Bus::JOY_CTRL).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::JOY_BAUD).unwrap(), 0);
    }

    #[test]
    fn test_controller_write32_stub() {
        let mut bus = Bus::new();
        assert!(bus.write_io_port32(Bus::JOY_DATA, 0x42).is_ok());
        assert!(bus.write_io_port32(Bus::JOY_MODE, 0x0D).is_ok());
        assert!(bus.write_io_port32(Bus::JOY_CTRL, 0x1003).is_ok());
        assert!(bus.write_io_port32(Bus::JOY_BAUD, 0x88).is_ok());
    }

    #[test]
    fn test_timer_read32_stub() {
        let bus = Bus::new();
        assert_eq!(bus.read_io_port32(Bus::TIMER0_COUNTER).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER0_MODE).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER0_TARGET).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER1_COUNTER).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER1_MODE).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER1_TARGET).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER2_COUNTER).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER2_MODE).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::TIMER2_TARGET).unwrap(), 0);
    }

    #[test]
    fn test_timer_write32_stub() {
        let mut bus = Bus::new();
        assert!(bus.write_io_port32(Bus::TIMER0_COUNTER, 0).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER0_MODE, 0x0100).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER0_TARGET, 0xFFFF).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER1_COUNTER, 0).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER1_MODE, 0x0100).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER1_TARGET, 0xFFFF).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER2_COUNTER, 0).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER2_MODE, 0x0100).is_ok());
        assert!(bus.write_io_port32(Bus::TIMER2_TARGET, 0xFFFF).is_ok());
    }

    #[test]
    fn test_interrupt_read32_uninitialized() {
        let bus = Bus::new();
        assert_eq!(bus.read_io_port32(Bus::I_STAT).unwrap(), 0);
        assert_eq!(bus.read_io_port32(Bus::I_MASK).unwrap(), 0);
    }

    #[test]
    fn test_interrupt_write32_uninitialized() {
        let mut bus = Bus::new();
        assert!(bus.write_io_port32(Bus::I_STAT, 0xFFFF).is_ok());
        assert!(bus.write_io_port32(Bus::I_MASK, 0x03FF).is_ok());
    }

    #[test]
    fn test_interrupt_controller_wired() {
        use crate::core::interrupt::{interrupts, InterruptController};
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut bus = Bus::new();
        let ic = Rc::new(RefCell::new(InterruptController::new()));
        bus.set_interrupt_controller(ic.clone());

        ic.borrow_mut().request(interrupts::VBLANK);
        assert_eq!(
            bus.read_io_port32(Bus::I_STAT).unwrap(),
            interrupts::VBLANK as u32
        );

        bus.write_io_port32(Bus::I_MASK, interrupts::VBLANK as u32)
            .unwrap();
        assert_eq!(
            bus.read_io_port32(Bus::I_MASK).unwrap(),
            interrupts::VBLANK as u32
        );
    }

    #[test]
    fn test_dma_read32_initial_state() {
        let bus = Bus::new();
        for channel in 0..7 {
            let base = 0x1F801080 + (channel * 0x10);
            assert_eq!(bus.read_io_port32(base).unwrap(), 0);
            assert_eq!(bus.read_io_port32(base + 0x04).unwrap(), 0);
            assert_eq!(bus.read_io_port32(base + 0x08).unwrap(), 0);
        }
        assert_eq!(bus.read_io_port32(Bus::DMA_DPCR).unwrap(), 0x07654321);
        assert_eq!(bus.read_io_port32(Bus::DMA_DICR).unwrap(), 0);
    }

    #[test]
    fn test_dma_channel_registers_round_trip() {
        let mut bus = Bus::new();
        for channel in 0..7 {
            let base = 0x1F801080 + (channel * 0x10);
            bus.write_io_port32(base, 0x80001000).unwrap();
            bus.write_io_port32(base + 0x04, 0x00100010).unwrap();
            bus.write_io_port32(base + 0x08, 0x01000201).unwrap();

            assert_eq!(bus.read_io_port32(base).unwrap(), 0x80001000);
            assert_eq!(bus.read_io_port32(base + 0x04).unwrap(), 0x00100010);
            assert_eq!(bus.read_io_port32(base + 0x08).unwrap(), 0x01000201);
        }
        assert!(bus.write_io_port32(Bus::DMA_DPCR, 0x07654321).is_ok());
        assert_eq!(bus.read_io_port32(Bus::DMA_DPCR).unwrap(), 0x07654321);
        assert!(bus.write_io_port32(Bus::DMA_DICR, 0x00FF803F).is_ok());
        assert_eq!(bus.read_io_port32(Bus::DMA_DICR).unwrap(), 0x00FF803F);
    }

    #[test]
    fn test_dma_channels_are_independent() {
        let mut bus = Bus::new();
        bus.write_io_port32(0x1F801080, 0x11111111).unwrap(); // ch0 MADR
        bus.write_io_port32(0x1F801090, 0x22222222).unwrap(); // ch1 MADR
        assert_eq!(bus.read_io_port32(0x1F801080).unwrap(), 0x11111111);
        assert_eq!(bus.read_io_port32(0x1F801090).unwrap(), 0x22222222);
    }

    #[test]
    fn test_dpcr_priority_conflict_reports_fatal_event() {
        use crate::core::event::EmulatorEvent;
        use std::cell::RefCell;
        use std::rc::Rc;

        let events: Rc<RefCell<Vec<EmulatorEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_events = events.clone();
        let sink = Rc::new(RefCell::new(move |event: EmulatorEvent| {
            sink_events.borrow_mut().push(event);
        }));
        let mut bus = Bus::new();
        bus.set_event_sink(sink);

        // Channels 0 and 1 both enabled (bit 3 set) at priority 2.
        bus.write_io_port32(Bus::DMA_DPCR, 0x0000_00AA).unwrap();

        assert_eq!(events.borrow().len(), 1);
        assert!(matches!(
            &events.borrow()[0],
            EmulatorEvent::LogMessage { module_id, .. } if *module_id == "dma"
        ));
    }

    #[test]
    fn test_dpcr_distinct_priorities_raise_no_event() {
        use crate::core::event::EmulatorEvent;
        use std::cell::RefCell;
        use std::rc::Rc;

        let events: Rc<RefCell<Vec<EmulatorEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_events = events.clone();
        let sink = Rc::new(RefCell::new(move |event: EmulatorEvent| {
            sink_events.borrow_mut().push(event);
        }));
        let mut bus = Bus::new();
        bus.set_event_sink(sink);

        assert!(bus.write_io_port32(Bus::DMA_DPCR, 0x07654321).is_ok());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_cdrom_read8_stub() {
        let bus = Bus::new();
        assert_eq!(bus.read_io_port8(Bus::CDROM_INDEX).unwrap(), 0x18);
        assert_eq!(bus.read_io_port8(Bus::CDROM_REG1).unwrap(), 0);
        assert_eq!(bus.read_io_port8(Bus::CDROM_REG2).unwrap(), 0);
        assert_eq!(bus.read_io_port8(Bus::CDROM_REG3).unwrap(), 0);
    }

    #[test]
    fn test_cdrom_write8_stub() {
        let mut bus = Bus::new();
        assert!(bus.write_io_port8(Bus::CDROM_INDEX, 0x01).is_ok());
        assert!(bus.write_io_port8(Bus::CDROM_REG1, 0x01).is_ok());
        assert!(bus.write_io_port8(Bus::CDROM_REG2, 0x07).is_ok());
        assert!(bus.write_io_port8(Bus::CDROM_REG3, 0x1F).is_ok());
    }

    #[test]
    fn test_spu_read16_stub() {
        let bus = Bus::new();
        assert_eq!(bus.read_io_port16(0x1F801C00).unwrap(), 0);
        assert_eq!(bus.read_io_port16(0x1F801D80).unwrap(), 0);
        assert_eq!(bus.read_io_port16(0x1F801FFE).unwrap(), 0);
    }

    #[test]
    fn test_spu_write16_stub() {
        let mut bus = Bus::new();
        assert!(bus.write_io_port16(0x1F801C00, 0x0000).is_ok());
        assert!(bus.write_io_port16(0x1F801D80, 0xC000).is_ok());
        assert!(bus.write_io_port16(0x1F801FFE, 0xFFFF).is_ok());
    }

    #[test]
    fn test_unknown_io_port_read32() {
        let bus = Bus::new();
        assert_eq!(bus.read_io_port32(0x1F801FFC).unwrap(), 0);
        assert_eq!(bus.read_io_port32(0x1F802FFC).unwrap(), 0);
    }

    #[test]
    fn test_unknown_io_port_write32() {
        let mut bus = Bus::new();
        assert!(bus.write_io_port32(0x1F801FFC, 0xDEADBEEF).is_ok());
        assert!(bus.write_io_port32(0x1F802FFC, 0xCAFEBABE).is_ok());
    }

    #[test]
    fn test_io_port_address_constants() {
        assert_eq!(Bus::GPU_GP0, 0x1F801810);
        assert_eq!(Bus::GPU_GP1, 0x1F801814);
        assert_eq!(Bus::JOY_DATA, 0x1F801040);
        assert_eq!(Bus::JOY_STAT, 0x1F801044);
        assert_eq!(Bus::JOY_MODE, 0x1F801048);
        assert_eq!(Bus::JOY_CTRL, 0x1F80104A);
        assert_eq!(Bus::JOY_BAUD, 0x1F80104E);
        assert_eq!(Bus::I_STAT, 0x1F801070);
        assert_eq!(Bus::I_MASK, 0x1F801074);
        assert_eq!(Bus::DMA_DPCR, 0x1F8010F0);
        assert_eq!(Bus::DMA_DICR, 0x1F8010F4);
        assert_eq!(Bus::TIMER0_COUNTER, 0x1F801100);
        assert_eq!(Bus::TIMER0_MODE, 0x1F801104);
        assert_eq!(Bus::TIMER0_TARGET, 0x1F801108);
        assert_eq!(Bus::TIMER1_COUNTER, 0x1F801110);
        assert_eq!(Bus::TIMER1_MODE, 0x1F801114);
        assert_eq!(Bus::TIMER1_TARGET, 0x1F801118);
        assert_eq!(Bus::TIMER2_COUNTER, 0x1F801120);
        assert_eq!(Bus::TIMER2_MODE, 0x1F801124);
        assert_eq!(Bus::TIMER2_TARGET, 0x1F801128);
        assert_eq!(Bus::CDROM_INDEX, 0x1F801800);
        assert_eq!(Bus::CDROM_REG1, 0x1F801801);
        assert_eq!(Bus::CDROM_REG2, 0x1F801802);
        assert_eq!(Bus::CDROM_REG3, 0x1F801803);
    }
}
