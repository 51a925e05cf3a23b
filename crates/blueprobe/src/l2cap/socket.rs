//! BlueZ L2CAP socket implementation
//!
//! Wraps an `AF_BLUETOOTH`/`BTPROTO_L2CAP` sequential-packet socket:
//! one `read` returns one complete PDU and one `write` sends one.

use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use log::{debug, warn};

use super::{
    ConnectOptions, L2capError, L2capResult, PduChannel, Transport, ATT_CID, ATT_PSM,
    BREDR_DEFAULT_MTU, LE_DEFAULT_MTU,
};

// Bluetooth socket constants
const AF_BLUETOOTH: i32 = 31;
const BTPROTO_L2CAP: i32 = 0;
const SOL_BLUETOOTH: i32 = 274;
const SOL_L2CAP: i32 = 6;
const L2CAP_OPTIONS: i32 = 0x01;
const BT_SECURITY: i32 = 4;
const BT_SECURITY_LOW: u8 = 1;
const BT_SNDMTU: i32 = 12;
const BT_RCVMTU: i32 = 13;
const BDADDR_BREDR: u8 = 0x00;
const BDADDR_LE_PUBLIC: u8 = 0x01;

// Largest ATT PDU we expect to receive (MTU 517 plus slack)
const RECV_BUF_LEN: usize = 1024;

// Define the sockaddr_l2 structure
#[repr(C)]
struct SockaddrL2 {
    l2_family: libc::sa_family_t,
    l2_psm: u16,
    l2_bdaddr: [u8; 6],
    l2_cid: u16,
    l2_bdaddr_type: u8,
}

#[repr(C)]
struct BtSecurity {
    level: u8,
    key_size: u8,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct L2capOptions {
    omtu: u16,
    imtu: u16,
    flush_to: u16,
    mode: u8,
    fcs: u8,
    max_tx: u8,
    txwin_size: u16,
}

/// A connected L2CAP channel carrying ATT PDUs
#[derive(Debug)]
pub struct L2capSocket {
    fd: RawFd,
    mtu: u16,
}

impl L2capSocket {
    /// Connects to the remote device's ATT channel.
    ///
    /// Validates the options, creates the socket, binds the local
    /// adapter address, applies the security level and any requested
    /// MTU, then performs a blocking connect.
    pub fn connect(opts: &ConnectOptions) -> L2capResult<Self> {
        opts.validate()?;

        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_SEQPACKET, BTPROTO_L2CAP) };
        if fd < 0 {
            return Err(L2capError::Socket(std::io::Error::last_os_error()));
        }

        let mut socket = L2capSocket { fd, mtu: 0 };

        let (psm, cid, addr_type) = match opts.transport {
            Transport::BrEdr => (ATT_PSM, 0, BDADDR_BREDR),
            Transport::LowEnergy => (0, ATT_CID, BDADDR_LE_PUBLIC),
        };

        // Bind the source address so the kernel uses the right adapter
        let local = SockaddrL2 {
            l2_family: AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: 0,
            l2_bdaddr: opts.source.bytes,
            l2_cid: cid.to_le(),
            l2_bdaddr_type: addr_type,
        };
        let result = unsafe {
            libc::bind(
                fd,
                &local as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };
        if result < 0 {
            return Err(L2capError::Bind(std::io::Error::last_os_error()));
        }

        socket.set_security_low()?;

        if opts.mtu != 0 {
            socket.set_mtu(opts.mtu, opts.transport)?;
        }

        let remote = SockaddrL2 {
            l2_family: AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: psm.to_le(),
            l2_bdaddr: opts.destination.bytes,
            l2_cid: cid.to_le(),
            l2_bdaddr_type: addr_type,
        };
        let result = unsafe {
            libc::connect(
                fd,
                &remote as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };
        if result < 0 {
            return Err(L2capError::Connect(std::io::Error::last_os_error()));
        }

        socket.mtu = socket.negotiated_mtu(opts);
        debug!("L2CAP channel to {} up, MTU {}", opts.destination, socket.mtu);

        Ok(socket)
    }

    fn set_security_low(&self) -> L2capResult<()> {
        let sec = BtSecurity {
            level: BT_SECURITY_LOW,
            key_size: 0,
        };
        let result = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_BLUETOOTH,
                BT_SECURITY,
                &sec as *const _ as *const libc::c_void,
                std::mem::size_of::<BtSecurity>() as libc::socklen_t,
            )
        };
        if result < 0 {
            return Err(L2capError::SetOption(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn set_mtu(&self, mtu: u16, transport: Transport) -> L2capResult<()> {
        match transport {
            Transport::BrEdr => {
                // Classic channels configure the MTU through L2CAP_OPTIONS
                let mut options = L2capOptions::default();
                let mut len = std::mem::size_of::<L2capOptions>() as libc::socklen_t;
                let result = unsafe {
                    libc::getsockopt(
                        self.fd,
                        SOL_L2CAP,
                        L2CAP_OPTIONS,
                        &mut options as *mut _ as *mut libc::c_void,
                        &mut len,
                    )
                };
                if result < 0 {
                    return Err(L2capError::SetOption(std::io::Error::last_os_error()));
                }

                options.omtu = mtu;
                options.imtu = mtu;

                let result = unsafe {
                    libc::setsockopt(
                        self.fd,
                        SOL_L2CAP,
                        L2CAP_OPTIONS,
                        &options as *const _ as *const libc::c_void,
                        std::mem::size_of::<L2capOptions>() as libc::socklen_t,
                    )
                };
                if result < 0 {
                    return Err(L2capError::SetOption(std::io::Error::last_os_error()));
                }
            }
            Transport::LowEnergy => {
                // The LE fixed channel uses BT_SNDMTU/BT_RCVMTU instead
                for opt in [BT_SNDMTU, BT_RCVMTU] {
                    let result = unsafe {
                        libc::setsockopt(
                            self.fd,
                            SOL_BLUETOOTH,
                            opt,
                            &mtu as *const _ as *const libc::c_void,
                            std::mem::size_of::<u16>() as libc::socklen_t,
                        )
                    };
                    if result < 0 {
                        return Err(L2capError::SetOption(std::io::Error::last_os_error()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads back the MTU the kernel settled on, falling back to the
    /// bearer default when the query is unsupported.
    fn negotiated_mtu(&self, opts: &ConnectOptions) -> u16 {
        let fallback = if opts.mtu != 0 {
            opts.mtu
        } else {
            match opts.transport {
                Transport::BrEdr => BREDR_DEFAULT_MTU,
                Transport::LowEnergy => LE_DEFAULT_MTU,
            }
        };

        match opts.transport {
            Transport::BrEdr => {
                let mut options = L2capOptions::default();
                let mut len = std::mem::size_of::<L2capOptions>() as libc::socklen_t;
                let result = unsafe {
                    libc::getsockopt(
                        self.fd,
                        SOL_L2CAP,
                        L2CAP_OPTIONS,
                        &mut options as *mut _ as *mut libc::c_void,
                        &mut len,
                    )
                };
                if result < 0 || options.omtu == 0 {
                    warn!("could not query L2CAP options, assuming MTU {}", fallback);
                    fallback
                } else {
                    options.omtu
                }
            }
            Transport::LowEnergy => {
                let mut mtu: u16 = 0;
                let mut len = std::mem::size_of::<u16>() as libc::socklen_t;
                let result = unsafe {
                    libc::getsockopt(
                        self.fd,
                        SOL_BLUETOOTH,
                        BT_SNDMTU,
                        &mut mtu as *mut _ as *mut libc::c_void,
                        &mut len,
                    )
                };
                if result < 0 || mtu == 0 {
                    fallback
                } else {
                    mtu
                }
            }
        }
    }

    fn wait_readable(&self, timeout: Duration) -> L2capResult<()> {
        let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(self.fd, &mut read_fds);
        }

        let mut timeout_val = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };

        let result = unsafe {
            libc::select(
                self.fd + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut timeout_val,
            )
        };

        if result < 0 {
            return Err(L2capError::Recv(std::io::Error::last_os_error()));
        }
        if result == 0 {
            return Err(L2capError::Timeout);
        }
        Ok(())
    }
}

impl PduChannel for L2capSocket {
    fn send(&mut self, pdu: &[u8]) -> L2capResult<()> {
        let result = unsafe {
            libc::write(self.fd, pdu.as_ptr() as *const libc::c_void, pdu.len())
        };
        if result < 0 {
            return Err(L2capError::Send(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn recv(&mut self, timeout: Option<Duration>) -> L2capResult<Vec<u8>> {
        if let Some(timeout) = timeout {
            self.wait_readable(timeout)?;
        }

        let mut buffer = [0u8; RECV_BUF_LEN];
        let bytes_read = unsafe {
            libc::read(
                self.fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };

        if bytes_read < 0 {
            return Err(L2capError::Recv(std::io::Error::last_os_error()));
        }
        if bytes_read == 0 {
            return Err(L2capError::Disconnected);
        }

        Ok(buffer[..bytes_read as usize].to_vec())
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }
}

impl AsRawFd for L2capSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for L2capSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
