use anyhow::{Result, anyhow};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::ptr;

use crate::export::{ExportSink, LocalStore, MediaStoreSink, timestamped_name};
use crate::scene::Scene;
use crate::{compose_file, compositor_from_settings, settings};

use super::error::{cstr_to_string, set_last_error, string_to_c};

/// Composes `scene_json` onto the image at `base_path` and saves it to the
/// local store. With `gallery`, the result is also exported to the gallery.
/// Returns the saved path (caller frees), or null with the last error set.
#[unsafe(no_mangle)]
pub extern "C" fn meme_ext_compose(
    base_path: *const c_char,
    scene_json: *const c_char,
    settings_path: *const c_char,
    gallery: bool,
) -> *mut c_char {
    let Some(base_path) = cstr_to_string(base_path) else {
        set_last_error("base_path is null");
        return ptr::null_mut();
    };
    let Some(scene_json) = cstr_to_string(scene_json) else {
        set_last_error("scene_json is null");
        return ptr::null_mut();
    };
    let settings_path = cstr_to_string(settings_path).map(PathBuf::from);
    match compose_and_save(Path::new(&base_path), &scene_json, settings_path.as_deref(), gallery) {
        Ok(saved) => string_to_c(&saved.to_string_lossy()),
        Err(err) => {
            set_last_error(format!("{:#}", err));
            ptr::null_mut()
        }
    }
}

/// Copies a meme from the local store into the gallery. Returns the exported
/// path (caller frees), or null with the last error set.
#[unsafe(no_mangle)]
pub extern "C" fn meme_ext_export_saved(
    saved_path: *const c_char,
    settings_path: *const c_char,
) -> *mut c_char {
    let Some(saved_path) = cstr_to_string(saved_path) else {
        set_last_error("saved_path is null");
        return ptr::null_mut();
    };
    let settings_path = cstr_to_string(settings_path).map(PathBuf::from);
    let result = settings::load_settings(settings_path.as_deref()).and_then(|settings| {
        MediaStoreSink::from_settings(&settings)
            .export_saved(Path::new(&saved_path))
            .map_err(anyhow::Error::from)
    });
    match result {
        Ok(path) => string_to_c(&path.to_string_lossy()),
        Err(err) => {
            set_last_error(format!("{:#}", err));
            ptr::null_mut()
        }
    }
}

fn compose_and_save(
    base_path: &Path,
    scene_json: &str,
    settings_path: Option<&Path>,
    gallery: bool,
) -> Result<PathBuf> {
    let settings = settings::load_settings(settings_path)?;
    let scene = Scene::from_json(scene_json)?;
    let compositor = compositor_from_settings(&settings);
    let outcome = compose_file(&compositor, base_path, &scene)?;
    let saved = LocalStore::from_settings(&settings).save(&outcome.image)?;
    if gallery {
        MediaStoreSink::from_settings(&settings)
            .export(&outcome.image, &timestamped_name("Export"))
            .map_err(|err| anyhow!("saved to {} but {}", saved.display(), err))?;
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::error::meme_ext_last_error_message;
    use crate::test_util::{solid, with_temp_home};
    use std::ffi::CString;

    #[test]
    fn compose_saves_and_reports_errors() {
        with_temp_home(|home| {
            let base = home.join("base.png");
            solid(32, 32, [80, 80, 80, 255]).save(&base).expect("save base");
            let base_c = CString::new(base.to_string_lossy().as_ref()).expect("cstring");
            let scene = CString::new(
                r#"{"container": {"width": 32, "height": 32}, "density": 1, "overlays": []}"#,
            )
            .expect("cstring");

            let saved = meme_ext_compose(base_c.as_ptr(), scene.as_ptr(), ptr::null(), false);
            let saved_path = cstr_to_string(saved).expect("saved path");
            crate::ext::error::meme_ext_free_string(saved);
            assert!(Path::new(&saved_path).exists());

            let bad = CString::new(r#"{"density": 1}"#).expect("cstring");
            let result = meme_ext_compose(base_c.as_ptr(), bad.as_ptr(), ptr::null(), false);
            assert!(result.is_null());
            let message = cstr_to_string(meme_ext_last_error_message()).expect("message");
            assert!(message.contains("scene"), "{message}");

            assert!(meme_ext_compose(ptr::null(), scene.as_ptr(), ptr::null(), false).is_null());
        });
    }
}
