//! Raw-mode terminal configuration.
//!
//! Once applied, a read returns as soon as one byte is available, nothing is
//! echoed or translated, and no flow control is used.

use crate::backend::error::BackendError;

/// Baud rates this module knows a terminal speed constant for, on some platform.
const CANDIDATE_BAUD_RATES: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200, 230400, 460800, 500000, 576000, 921600, 1000000, 1152000, 1500000, 2000000, 2500000,
    3000000, 3500000, 4000000,
];

/// Map an integer baud rate onto the platform's terminal speed constant.
///
/// Returns `None` for 0 (which would mean "hang up") and for any rate the
/// platform has no constant for.
pub fn speed_for(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        50 => libc::B50,
        75 => libc::B75,
        110 => libc::B110,
        134 => libc::B134,
        150 => libc::B150,
        200 => libc::B200,
        300 => libc::B300,
        600 => libc::B600,
        1200 => libc::B1200,
        1800 => libc::B1800,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        460800 => libc::B460800,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        500000 => libc::B500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        576000 => libc::B576000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        921600 => libc::B921600,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1000000 => libc::B1000000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1152000 => libc::B1152000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1500000 => libc::B1500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        2000000 => libc::B2000000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        2500000 => libc::B2500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        3000000 => libc::B3000000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        3500000 => libc::B3500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        4000000 => libc::B4000000,
        _ => return None,
    };
    Some(speed)
}

/// Baud rates accepted by [`RawMode::new`] on this platform, ascending.
pub fn supported_baud_rates() -> Vec<u32> {
    CANDIDATE_BAUD_RATES
        .iter()
        .copied()
        .filter(|rate| speed_for(*rate).is_some())
        .collect()
}

/// Raw-mode settings derived from a requested baud rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMode {
    baud_rate: u32,
    speed: libc::speed_t,
}

impl RawMode {
    /// Validate `baud_rate` against the platform speed table.
    pub fn new(baud_rate: u32) -> Result<Self, BackendError> {
        let speed = speed_for(baud_rate).ok_or(BackendError::UnsupportedBaudRate(baud_rate))?;
        Ok(Self { baud_rate, speed })
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Rewrite `attributes` in place for raw, unbuffered 8N1 transfer.
    pub fn apply(&self, attributes: &mut libc::termios) -> Result<(), BackendError> {
        // 8N1, no hardware flow control, receiver on, modem lines ignored
        attributes.c_cflag &= !(libc::PARENB | libc::CSTOPB | libc::CSIZE | libc::CRTSCTS);
        attributes.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;

        attributes.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHONL | libc::ISIG);

        attributes.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
        attributes.c_iflag &= !(libc::IGNBRK
            | libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL);

        attributes.c_oflag &= !(libc::OPOST | libc::ONLCR);

        // Block until at least one byte arrives, then return immediately.
        attributes.c_cc[libc::VMIN] = 1;
        attributes.c_cc[libc::VTIME] = 0;

        let input = unsafe { libc::cfsetispeed(attributes, self.speed) };
        let output = unsafe { libc::cfsetospeed(attributes, self.speed) };
        if input != 0 || output != 0 {
            return Err(BackendError::UnsupportedBaudRate(self.baud_rate));
        }
        Ok(())
    }
}

/// A cooked-mode attribute set: canonical input, echo, CR/NL translation,
/// software flow control and output post-processing all switched on.
pub(crate) fn cooked_attributes() -> libc::termios {
    // SAFETY: termios is plain data; all-zero is a valid value.
    let mut attributes: libc::termios = unsafe { std::mem::zeroed() };
    attributes.c_iflag = libc::ICRNL | libc::IXON | libc::BRKINT | libc::ISTRIP;
    attributes.c_oflag = libc::OPOST | libc::ONLCR;
    attributes.c_cflag = libc::CS7 | libc::PARENB | libc::CSTOPB | libc::CRTSCTS | libc::CREAD;
    attributes.c_lflag = libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHONL | libc::ISIG;
    attributes.c_cc[libc::VMIN] = 0;
    attributes.c_cc[libc::VTIME] = 5;
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(baud_rate: u32) -> libc::termios {
        let mut attributes = cooked_attributes();
        RawMode::new(baud_rate)
            .unwrap()
            .apply(&mut attributes)
            .unwrap();
        attributes
    }

    #[test]
    fn test_control_flags_are_8n1_without_flow_control() {
        let attributes = raw(9600);
        assert_eq!(attributes.c_cflag & libc::CSIZE, libc::CS8);
        assert_eq!(attributes.c_cflag & libc::PARENB, 0);
        assert_eq!(attributes.c_cflag & libc::CSTOPB, 0);
        assert_eq!(attributes.c_cflag & libc::CRTSCTS, 0);
        assert_ne!(attributes.c_cflag & libc::CREAD, 0);
        assert_ne!(attributes.c_cflag & libc::CLOCAL, 0);
    }

    #[test]
    fn test_local_input_output_flags_are_cleared() {
        let attributes = raw(9600);
        let local = libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHONL | libc::ISIG;
        assert_eq!(attributes.c_lflag & local, 0);

        let input = libc::IXON
            | libc::IXOFF
            | libc::IXANY
            | libc::IGNBRK
            | libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL;
        assert_eq!(attributes.c_iflag & input, 0);
        assert_eq!(attributes.c_oflag & (libc::OPOST | libc::ONLCR), 0);
    }

    #[test]
    fn test_timing_returns_after_one_byte() {
        let attributes = raw(115200);
        assert_eq!(attributes.c_cc[libc::VMIN], 1);
        assert_eq!(attributes.c_cc[libc::VTIME], 0);
    }

    #[test]
    fn test_speed_applied_to_both_directions() {
        let attributes = raw(9600);
        unsafe {
            assert_eq!(libc::cfgetispeed(&attributes), libc::B9600);
            assert_eq!(libc::cfgetospeed(&attributes), libc::B9600);
        }
    }

    #[test]
    fn test_zero_baud_rate_is_rejected() {
        assert!(matches!(
            RawMode::new(0),
            Err(BackendError::UnsupportedBaudRate(0))
        ));
    }

    #[test]
    fn test_common_rates_are_supported() {
        let rates = supported_baud_rates();
        for rate in [300, 1200, 9600, 19200, 57600, 115200] {
            assert!(rates.contains(&rate), "{rate} missing");
        }
        assert!(rates.windows(2).all(|pair| pair[0] < pair[1]));
    }

    proptest! {
        #[test]
        fn unlisted_rates_are_rejected(baud_rate in any::<u32>()) {
            prop_assume!(speed_for(baud_rate).is_none());
            let rejected = matches!(
                RawMode::new(baud_rate),
                Err(BackendError::UnsupportedBaudRate(rate)) if rate == baud_rate
            );
            prop_assert!(rejected);
        }

        #[test]
        fn every_supported_rate_yields_raw_attributes(
            index in 0..supported_baud_rates().len()
        ) {
            let baud_rate = supported_baud_rates()[index];
            let attributes = raw(baud_rate);
            prop_assert_eq!(attributes.c_lflag & libc::ICANON, 0);
            prop_assert_eq!(attributes.c_cc[libc::VMIN], 1);
            let speed = unsafe { libc::cfgetospeed(&attributes) };
            prop_assert_eq!(Some(speed), speed_for(baud_rate));
        }
    }
}
