use crate::backend::TargetWindow;
use crate::liveness::ProcessProbe;

#[cfg(windows)]
mod imp {
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        IsWindow, PostMessageW, SetForegroundWindow, ShowWindow, SW_RESTORE, WM_KEYDOWN,
        WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP,
    };

    use crate::backend::TargetWindow;
    use crate::error::DeliveryError;
    use crate::input::{DeliveryStrategy, KeyDirection, VirtualKey};

    // Repeat count 1; key-up also sets the previous-state and transition bits.
    const KEYDOWN_LPARAM: isize = 0x0000_0001;
    const KEYUP_LPARAM: isize = 0xC000_0001_u32 as i32 as isize;
    const MK_LBUTTON: usize = 0x0001;

    pub(super) fn is_window(window: TargetWindow) -> bool {
        // SAFETY: IsWindow accepts any handle value and only reads it.
        unsafe { IsWindow(window.0) != 0 }
    }

    pub(super) fn focus(window: TargetWindow) -> bool {
        // SAFETY: both calls tolerate stale handles and report failure.
        unsafe {
            ShowWindow(window.0, SW_RESTORE);
            SetForegroundWindow(window.0) != 0
        }
    }

    /// Posts key messages straight into the target's message queue.
    pub struct WindowMessages {
        window: TargetWindow,
    }

    impl WindowMessages {
        pub fn new(window: TargetWindow) -> Self {
            Self { window }
        }
    }

    impl DeliveryStrategy for WindowMessages {
        fn name(&self) -> &'static str {
            "window-message"
        }

        fn deliver(&mut self, key: VirtualKey, direction: KeyDirection) -> Result<(), DeliveryError> {
            if !is_window(self.window) {
                return Err(DeliveryError::NoTargetWindow);
            }
            let (msg, wparam, lparam) = match (key.is_mouse(), direction) {
                (true, KeyDirection::Press) => (WM_LBUTTONDOWN, MK_LBUTTON, 0),
                (true, KeyDirection::Release) => (WM_LBUTTONUP, 0, 0),
                (false, KeyDirection::Press) => (WM_KEYDOWN, usize::from(key.vk_code()), KEYDOWN_LPARAM),
                (false, KeyDirection::Release) => (WM_KEYUP, usize::from(key.vk_code()), KEYUP_LPARAM),
            };
            // SAFETY: PostMessageW copies its arguments and fails on invalid handles.
            let posted = unsafe { PostMessageW(self.window.0, msg, wparam, lparam) };
            if posted == 0 {
                Err(DeliveryError::Rejected(format!(
                    "PostMessageW failed for {}",
                    self.window
                )))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(windows)]
pub use imp::WindowMessages;

/// Treats the target as alive while its window handle is valid.
pub struct WindowProbe {
    window: TargetWindow,
}

impl WindowProbe {
    pub fn new(window: TargetWindow) -> Self {
        Self { window }
    }
}

impl ProcessProbe for WindowProbe {
    #[cfg(windows)]
    fn is_alive(&mut self) -> bool {
        imp::is_window(self.window)
    }

    #[cfg(not(windows))]
    fn is_alive(&mut self) -> bool {
        let _ = self.window;
        true
    }
}

/// Restore and foreground the target once. Best-effort.
pub fn focus_window(window: TargetWindow) {
    #[cfg(windows)]
    {
        if imp::focus(window) {
            tracing::info!(window = %window, "target window focused");
        } else {
            tracing::warn!(window = %window, "failed to focus target window");
        }
    }
    #[cfg(not(windows))]
    tracing::debug!(window = %window, "window focusing is only supported on Windows");
}
