//! Minimal HCI access for adapter lookup
//!
//! The CLI lets the user pick a local adapter by interface name
//! ("hci0"). The L2CAP socket binds by address, so this module asks the
//! kernel for the adapter's address through the `HCIGETDEVINFO` ioctl
//! on a raw HCI socket.

use std::os::unix::io::RawFd;

use thiserror::Error;

use crate::addr::BdAddr;

const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;
// _IOR('H', 211, int)
const HCIGETDEVINFO: libc::c_ulong = 0x800448D3;

// struct hci_dev_info from the kernel UAPI; only dev_id and bdaddr are
// used here, the rest exists so the ioctl has the full buffer to fill
#[repr(C)]
#[allow(dead_code)]
struct HciDevInfo {
    dev_id: u16,
    name: [u8; 8],
    bdaddr: [u8; 6],
    flags: u32,
    dev_type: u8,
    features: [u8; 8],
    pkt_type: u32,
    link_policy: u32,
    link_mode: u32,
    acl_mtu: u16,
    acl_pkts: u16,
    sco_mtu: u16,
    sco_pkts: u16,
    stat: [u32; 10],
}

#[derive(Debug, Error)]
pub enum HciError {
    #[error("failed to open HCI socket: {0}")]
    Socket(std::io::Error),

    #[error("failed to query hci{0}: {1}")]
    DeviceInfo(u16, std::io::Error),
}

/// Returns the public address of the local adapter `hci<dev_id>`.
pub fn device_address(dev_id: u16) -> Result<BdAddr, HciError> {
    let fd: RawFd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW, BTPROTO_HCI) };
    if fd < 0 {
        return Err(HciError::Socket(std::io::Error::last_os_error()));
    }

    let mut info: HciDevInfo = unsafe { std::mem::zeroed() };
    info.dev_id = dev_id;

    let result = unsafe { libc::ioctl(fd, HCIGETDEVINFO, &mut info as *mut HciDevInfo) };
    let err = std::io::Error::last_os_error();
    unsafe { libc::close(fd) };

    if result < 0 {
        return Err(HciError::DeviceInfo(dev_id, err));
    }

    Ok(BdAddr::new(info.bdaddr))
}
