#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: every test that touches HOME holds HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    unsafe {
        match old_home {
            Some(old) => std::env::set_var("HOME", old),
            None => std::env::remove_var("HOME"),
        }
    }
    result
}

/// Solid-colour canvas with filled rectangles standing in for glyphs.
#[cfg(test)]
pub(crate) fn canvas_with_blocks(
    width: u32,
    height: u32,
    background: [u8; 3],
    ink: [u8; 3],
    blocks: &[(u32, u32, u32, u32)],
) -> image::RgbaImage {
    let mut image = image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([background[0], background[1], background[2], 255]),
    );
    for &(left, top, w, h) in blocks {
        for y in top..(top + h).min(height) {
            for x in left..(left + w).min(width) {
                image.put_pixel(x, y, image::Rgba([ink[0], ink[1], ink[2], 255]));
            }
        }
    }
    image
}
