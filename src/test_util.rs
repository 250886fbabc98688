#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    let old_base = std::env::var("MEME_FORGE_DIR").ok();
    // SAFETY: guarded by HOME_MUTEX; tests touching the environment go through here.
    unsafe {
        std::env::set_var("HOME", dir.path());
        std::env::remove_var("MEME_FORGE_DIR");
    }
    let result = func(dir.path());
    unsafe {
        match old_home {
            Some(old) => std::env::set_var("HOME", old),
            None => std::env::remove_var("HOME"),
        }
        if let Some(old) = old_base {
            std::env::set_var("MEME_FORGE_DIR", old);
        }
    }
    result
}

#[cfg(test)]
pub(crate) fn solid(width: u32, height: u32, rgba: [u8; 4]) -> image::RgbaImage {
    image::RgbaImage::from_pixel(width, height, image::Rgba(rgba))
}
