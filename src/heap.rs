/// Kernel heap.
///
/// Decoded images live on the heap, so `alloc` needs a global allocator.
/// `linked_list_allocator` manages a fixed virtual range that is backed with
/// usable frames from the bootloader's memory map, reached through the
/// physical memory mapping the bootloader sets up at a dynamic offset.

use core::fmt;

use bootloader_api::info::{MemoryRegionKind, MemoryRegions};
use linked_list_allocator::LockedHeap;
use x86_64::registers::control::Cr3;
use x86_64::structures::paging::mapper::MapToError;
use x86_64::structures::paging::{
    FrameAllocator, Mapper, OffsetPageTable, Page, PageTable, PageTableFlags, PhysFrame, Size4KiB,
};
use x86_64::{PhysAddr, VirtAddr};

pub const HEAP_START: usize = 0x_4444_4444_0000;
pub const HEAP_SIZE: usize = 1024 * 1024; // 1 MiB, room for a full-screen image

const FRAME_SIZE: u64 = 4096;

#[cfg_attr(target_os = "none", global_allocator)]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

#[derive(Debug)]
pub enum HeapError {
    NoPhysicalMemoryMapping,
    Map(MapToError<Size4KiB>),
}

impl From<MapToError<Size4KiB>> for HeapError {
    fn from(err: MapToError<Size4KiB>) -> Self {
        HeapError::Map(err)
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::NoPhysicalMemoryMapping => write!(f, "physical memory is not mapped"),
            HeapError::Map(err) => write!(f, "cannot map heap page: {:?}", err),
        }
    }
}

/// Hands out usable frames in address order, walking regions lazily.
struct UsableFrames {
    regions: &'static MemoryRegions,
    region: usize,
    next: u64,
}

impl UsableFrames {
    fn new(regions: &'static MemoryRegions) -> Self {
        Self {
            regions,
            region: 0,
            next: 0,
        }
    }
}

unsafe impl FrameAllocator<Size4KiB> for UsableFrames {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        while let Some(region) = self.regions.get(self.region) {
            if region.kind == MemoryRegionKind::Usable {
                let start = self.next.max(region.start).next_multiple_of(FRAME_SIZE);
                if start + FRAME_SIZE <= region.end {
                    self.next = start + FRAME_SIZE;
                    return Some(PhysFrame::containing_address(PhysAddr::new(start)));
                }
            }
            self.region += 1;
        }
        None
    }
}

/// # Safety
/// The complete physical memory must be mapped at `physical_memory_offset`
/// and this must be called only once.
unsafe fn active_page_table(physical_memory_offset: VirtAddr) -> OffsetPageTable<'static> {
    let (level_4_frame, _) = Cr3::read();
    let virt = physical_memory_offset + level_4_frame.start_address().as_u64();
    let table: &'static mut PageTable = unsafe { &mut *virt.as_mut_ptr() };
    unsafe { OffsetPageTable::new(table, physical_memory_offset) }
}

/// Map the heap range and hand it to the global allocator.
///
/// # Safety
/// Must be called once, with the memory map and physical memory offset the
/// bootloader reported.
pub unsafe fn init(
    physical_memory_offset: Option<u64>,
    regions: &'static MemoryRegions,
) -> Result<(), HeapError> {
    let offset = physical_memory_offset.ok_or(HeapError::NoPhysicalMemoryMapping)?;
    let mut mapper = unsafe { active_page_table(VirtAddr::new(offset)) };
    let mut frames = UsableFrames::new(regions);

    let heap_start = VirtAddr::new(HEAP_START as u64);
    let pages = Page::<Size4KiB>::range_inclusive(
        Page::containing_address(heap_start),
        Page::containing_address(heap_start + (HEAP_SIZE as u64 - 1)),
    );
    for page in pages {
        let frame = frames
            .allocate_frame()
            .ok_or(MapToError::FrameAllocationFailed)?;
        let flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;
        unsafe { mapper.map_to(page, frame, flags, &mut frames)?.flush() };
    }

    unsafe { ALLOCATOR.lock().init(HEAP_START as *mut u8, HEAP_SIZE) };
    log::info!("heap: {} KiB at {:#x}", HEAP_SIZE / 1024, HEAP_START);
    Ok(())
}
