//! # Memory Management
//!
//! Refcounted heap blocks behind STELA arrays and closures.
//!
//! ## Design
//!
//! An array or closure value is a single pointer to a block. A null pointer
//! is the empty value: a default-constructed array, or a closure that was
//! moved from. Copying a value retains the block; destroying it releases the
//! block, and the last release destroys the contents and frees it.
//!
//! ```text
//! ArrayBlock   { refcount, cap, len, data } -> [elem; cap]
//! ClosureBlock { refcount, dtor, func, env_size } env...
//! ```
//!
//! Both headers start with the refcount, so [`rc_retain`] works on either.
//!
//! Compiled programs are single-threaded; refcounts are plain integers.

use std::alloc::{self, Layout};
use std::mem;
use std::ptr;

/// Destructor for one element or for a closure environment.
pub type Destructor = unsafe extern "C" fn(*mut u8);

/// Alignment of array elements and closure environments.
pub const BLOCK_ALIGN: usize = 8;

/// Header of an array block.
#[repr(C)]
#[derive(Debug)]
pub struct ArrayBlock {
    /// Number of values sharing this block.
    pub refcount: usize,
    /// Element capacity of `data`.
    pub cap: usize,
    /// Number of initialized elements.
    pub len: usize,
    /// Element storage; null while `cap * elem_size` is zero.
    pub data: *mut u8,
}

/// Header of a closure block. The captured environment follows it.
#[repr(C)]
#[derive(Debug)]
pub struct ClosureBlock {
    /// Number of values sharing this block.
    pub refcount: usize,
    /// Destroys the captured values, if any need it.
    pub dtor: Option<Destructor>,
    /// The closure's code.
    pub func: *const u8,
    /// Size in bytes of the environment after the header.
    pub env_size: usize,
}

fn layout_overflow() -> ! {
    eprintln!("stela runtime: allocation size overflow");
    std::process::abort()
}

fn data_layout(elem_size: usize, cap: usize) -> Layout {
    let size = elem_size.checked_mul(cap).unwrap_or_else(|| layout_overflow());
    Layout::from_size_align(size, BLOCK_ALIGN).unwrap_or_else(|_| layout_overflow())
}

fn closure_layout(env_size: usize) -> Layout {
    let size = mem::size_of::<ClosureBlock>()
        .checked_add(env_size)
        .unwrap_or_else(|| layout_overflow());
    Layout::from_size_align(size, mem::align_of::<ClosureBlock>().max(BLOCK_ALIGN))
        .unwrap_or_else(|_| layout_overflow())
}

/// Allocate zeroed memory, aborting on exhaustion. Zero-sized requests give null.
unsafe fn allocate(layout: Layout) -> *mut u8 {
    if layout.size() == 0 {
        return ptr::null_mut();
    }
    let raw = alloc::alloc_zeroed(layout);
    if raw.is_null() {
        alloc::handle_alloc_error(layout);
    }
    raw
}

unsafe fn deallocate(raw: *mut u8, layout: Layout) {
    if !raw.is_null() && layout.size() != 0 {
        alloc::dealloc(raw, layout);
    }
}

// ============================================================================
// Arrays
// ============================================================================

/// Allocate an empty array block with room for `cap` elements.
pub fn array_new(elem_size: usize, cap: usize) -> *mut ArrayBlock {
    let header = Layout::new::<ArrayBlock>();
    // SAFETY: the header layout is non-zero-sized and the data layout was
    // checked for overflow.
    unsafe {
        let block = allocate(header).cast::<ArrayBlock>();
        block.write(ArrayBlock {
            refcount: 1,
            cap,
            len: 0,
            data: allocate(data_layout(elem_size, cap)),
        });
        block
    }
}

/// Append one element, copied bitwise from `elem`.
///
/// A null `*slot` is an empty array; a block is allocated for it.
///
/// # Safety
/// `slot` must point to a valid (possibly null) block pointer whose block
/// holds `elem_size`-byte elements, and `elem` must point to `elem_size`
/// readable bytes.
pub unsafe fn array_push(slot: *mut *mut ArrayBlock, elem: *const u8, elem_size: usize) {
    if (*slot).is_null() {
        *slot = array_new(elem_size, 4);
    }
    let block = &mut **slot;
    if block.len == block.cap {
        let new_cap = block.cap.max(2).checked_mul(2).unwrap_or_else(|| layout_overflow());
        let old = data_layout(elem_size, block.cap);
        let new = data_layout(elem_size, new_cap);
        let data = allocate(new);
        if !block.data.is_null() && !data.is_null() {
            ptr::copy_nonoverlapping(block.data, data, old.size());
        }
        deallocate(block.data, old);
        block.data = data;
        block.cap = new_cap;
    }
    if elem_size != 0 {
        ptr::copy_nonoverlapping(elem, block.data.add(block.len * elem_size), elem_size);
    }
    block.len += 1;
}

/// Number of elements; zero for the empty array.
///
/// # Safety
/// `block` must be null or a live array block.
pub unsafe fn array_len(block: *const ArrayBlock) -> usize {
    if block.is_null() {
        0
    } else {
        (*block).len
    }
}

/// Drop one reference. The last reference destroys every element with
/// `elem_dtor` and frees the block.
///
/// # Safety
/// `block` must be null or a live array block of `elem_size`-byte elements,
/// and the caller must own one of its references.
pub unsafe fn array_release(block: *mut ArrayBlock, elem_size: usize, elem_dtor: Option<Destructor>) {
    if block.is_null() || !release_ref(block.cast()) {
        return;
    }
    let ArrayBlock { cap, len, data, .. } = block.read();
    if let Some(dtor) = elem_dtor {
        for index in 0..len {
            dtor(data.add(index * elem_size));
        }
    }
    deallocate(data, data_layout(elem_size, cap));
    deallocate(block.cast(), Layout::new::<ArrayBlock>());
}

// ============================================================================
// Closures
// ============================================================================

/// Allocate a closure block with a zeroed environment of `env_size` bytes.
pub fn closure_new(func: *const u8, dtor: Option<Destructor>, env_size: usize) -> *mut ClosureBlock {
    // SAFETY: the closure layout always covers the non-zero-sized header.
    unsafe {
        let block = allocate(closure_layout(env_size)).cast::<ClosureBlock>();
        block.write(ClosureBlock {
            refcount: 1,
            dtor,
            func,
            env_size,
        });
        block
    }
}

/// The environment of a closure block.
///
/// # Safety
/// `block` must be a live closure block.
pub unsafe fn closure_env(block: *mut ClosureBlock) -> *mut u8 {
    block.cast::<u8>().add(mem::size_of::<ClosureBlock>())
}

/// Drop one reference. The last reference runs the environment destructor
/// and frees the block.
///
/// # Safety
/// `block` must be null or a live closure block, and the caller must own one
/// of its references.
pub unsafe fn closure_release(block: *mut ClosureBlock) {
    if block.is_null() || !release_ref(block.cast()) {
        return;
    }
    let ClosureBlock { dtor, env_size, .. } = block.read();
    if let Some(dtor) = dtor {
        dtor(closure_env(block));
    }
    deallocate(block.cast(), closure_layout(env_size));
}

// ============================================================================
// Reference counts
// ============================================================================

/// Add a reference to an array or closure block. Null is ignored.
///
/// # Safety
/// `block` must be null or a live block.
pub unsafe fn rc_retain(block: *mut u8) {
    if !block.is_null() {
        *block.cast::<usize>() += 1;
    }
}

/// The current refcount of a block; zero for null.
///
/// # Safety
/// `block` must be null or a live block.
pub unsafe fn refcount(block: *const u8) -> usize {
    if block.is_null() {
        0
    } else {
        *block.cast::<usize>()
    }
}

/// Decrement a refcount; true when it reached zero.
unsafe fn release_ref(block: *mut u8) -> bool {
    let count = &mut *block.cast::<usize>();
    *count -= 1;
    *count == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static DESTROYED: Cell<usize> = const { Cell::new(0) };
    }

    unsafe extern "C" fn count_destroy(_: *mut u8) {
        DESTROYED.with(|d| d.set(d.get() + 1));
    }

    #[test]
    fn test_push_grows_and_keeps_elements() {
        let mut block: *mut ArrayBlock = ptr::null_mut();
        unsafe {
            for value in 0u64..10 {
                array_push(&mut block, (&value as *const u64).cast(), 8);
            }
            assert_eq!(array_len(block), 10);
            let data = (*block).data.cast::<u64>();
            assert_eq!(*data.add(7), 7);
            array_release(block, 8, None);
        }
    }

    #[test]
    fn test_last_release_destroys_elements() {
        DESTROYED.with(|d| d.set(0));
        let mut block: *mut ArrayBlock = ptr::null_mut();
        unsafe {
            for value in 0u64..3 {
                array_push(&mut block, (&value as *const u64).cast(), 8);
            }
            rc_retain(block.cast());
            array_release(block, 8, Some(count_destroy));
            assert_eq!(DESTROYED.with(Cell::get), 0);
            array_release(block, 8, Some(count_destroy));
        }
        assert_eq!(DESTROYED.with(Cell::get), 3);
    }

    #[test]
    fn test_closure_environment_is_destroyed_once() {
        DESTROYED.with(|d| d.set(0));
        let block = closure_new(ptr::null(), Some(count_destroy), 16);
        unsafe {
            let env = closure_env(block);
            assert_eq!(*env, 0);
            rc_retain(block.cast());
            assert_eq!(refcount(block.cast()), 2);
            closure_release(block);
            closure_release(block);
        }
        assert_eq!(DESTROYED.with(Cell::get), 1);
    }

    #[test]
    fn test_null_handles_are_ignored() {
        unsafe {
            rc_retain(ptr::null_mut());
            array_release(ptr::null_mut(), 8, Some(count_destroy));
            closure_release(ptr::null_mut());
            assert_eq!(array_len(ptr::null()), 0);
        }
    }
}
