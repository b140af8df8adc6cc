//! Windows platform layer
//!
//! Packet-info datagram I/O goes through the `WSASendMsg`/`WSARecvMsg`
//! extension functions, looked up per call with
//! `SIO_GET_EXTENSION_FUNCTION_POINTER`. A failed lookup makes the caller fall
//! back to plain datagram I/O.

use std::ffi::c_void;
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::windows::io::AsRawSocket;
use std::ptr;

use entities_net_address::{AddrFamily, IpAddress};
use socket2::{SockAddr, Socket as Socket2};
use windows_sys::core::GUID;
use windows_sys::Win32::Networking::WinSock::{
    setsockopt, WSAGetLastError, WSAIoctl, SOCKADDR_IN, SOCKADDR_IN6, SOCKET, WSABUF, WSAMSG,
};

use crate::error::{OsCondition, Operation};

pub(crate) const SOCKADDR_IN_LEN: usize = mem::size_of::<SOCKADDR_IN>();
pub(crate) const SOCKADDR_IN6_LEN: usize = mem::size_of::<SOCKADDR_IN6>();

const WSAEACCES: i32 = 10013;
const WSAEWOULDBLOCK: i32 = 10035;
const WSAEINPROGRESS: i32 = 10036;
const WSAEADDRINUSE: i32 = 10048;
const WSAEADDRNOTAVAIL: i32 = 10049;
const WSAECONNRESET: i32 = 10054;
const WSAETIMEDOUT: i32 = 10060;
const WSAECONNREFUSED: i32 = 10061;

const IPPROTO_IP: i32 = 0;
const IPPROTO_IPV6: i32 = 41;
const IP_PKTINFO: i32 = 19;
const IPV6_PKTINFO: i32 = 19;

const SIO_GET_EXTENSION_FUNCTION_POINTER: u32 = 0xC800_0006;
const WSAID_WSARECVMSG: GUID = GUID::from_u128(0xf689d7c8_6f1f_436b_8a53_e54fe351c322);
const WSAID_WSASENDMSG: GUID = GUID::from_u128(0xa441e712_754f_43ca_84a7_0dee44cf606d);

type RecvMsgFn =
    unsafe extern "system" fn(SOCKET, *mut WSAMSG, *mut u32, *mut c_void, *mut c_void) -> i32;
type SendMsgFn =
    unsafe extern "system" fn(SOCKET, *const WSAMSG, u32, *mut u32, *mut c_void, *mut c_void) -> i32;

pub(crate) const SEND_FLAGS: i32 = 0;

pub(crate) fn os_condition(op: Operation, code: i32) -> Option<OsCondition> {
    let condition = match code {
        // Windows reports an in-progress non-blocking connect as would-block.
        WSAEWOULDBLOCK if op == Operation::Connect => OsCondition::InProgress,
        WSAEWOULDBLOCK => OsCondition::WouldBlock,
        WSAEINPROGRESS => OsCondition::InProgress,
        WSAEADDRNOTAVAIL => OsCondition::AddressNotAvailable,
        WSAEADDRINUSE => OsCondition::AddressInUse,
        WSAEACCES => OsCondition::AccessDenied,
        WSAECONNREFUSED => OsCondition::ConnectionRefused,
        WSAECONNRESET => OsCondition::ConnectionReset,
        WSAETIMEDOUT => OsCondition::TimedOut,
        _ => return None,
    };
    Some(condition)
}

pub(crate) fn prepare(_socket: &Socket2) -> io::Result<()> {
    Ok(())
}

fn raw(socket: &Socket2) -> SOCKET {
    socket.as_raw_socket() as SOCKET
}

fn last_error() -> io::Error {
    // SAFETY: WSAGetLastError has no preconditions.
    io::Error::from_raw_os_error(unsafe { WSAGetLastError() })
}

pub(crate) fn enable_pktinfo(socket: &Socket2, family: AddrFamily) -> bool {
    let (level, name) = match family {
        AddrFamily::Ipv4 => (IPPROTO_IP, IP_PKTINFO),
        AddrFamily::Ipv6 => (IPPROTO_IPV6, IPV6_PKTINFO),
    };
    let on: u32 = 1;
    // SAFETY: `on` outlives the call and its size is passed alongside.
    let rc = unsafe {
        setsockopt(
            raw(socket),
            level,
            name,
            (&on as *const u32).cast(),
            mem::size_of::<u32>() as i32,
        )
    };
    rc == 0
}

/// Look up a Winsock extension function
unsafe fn extension<F: Copy>(socket: &Socket2, guid: &GUID) -> Option<F> {
    let mut function: Option<F> = None;
    let mut bytes = 0u32;
    let rc = WSAIoctl(
        raw(socket),
        SIO_GET_EXTENSION_FUNCTION_POINTER,
        (guid as *const GUID).cast(),
        mem::size_of::<GUID>() as u32,
        (&mut function as *mut Option<F>).cast(),
        mem::size_of::<Option<F>>() as u32,
        &mut bytes,
        ptr::null_mut(),
        None,
    );
    if rc != 0 {
        return None;
    }
    function
}

#[repr(C)]
struct CmsgHdr {
    cmsg_len: usize,
    cmsg_level: i32,
    cmsg_type: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct InPktinfo {
    ipi_addr: [u8; 4],
    ipi_ifindex: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct In6Pktinfo {
    ipi6_addr: [u8; 16],
    ipi6_ifindex: u32,
}

#[repr(C, align(8))]
struct ControlBuffer([u8; 64]);

const fn cmsg_align(len: usize) -> usize {
    let align = mem::align_of::<usize>();
    (len + align - 1) & !(align - 1)
}

const fn cmsg_data_offset() -> usize {
    cmsg_align(mem::size_of::<CmsgHdr>())
}

const fn cmsg_space(len: usize) -> usize {
    cmsg_align(mem::size_of::<CmsgHdr>() + cmsg_align(len))
}

pub(crate) fn send_msg_from(
    socket: &Socket2,
    buf: &[u8],
    remote: &SockAddr,
    local: &IpAddress,
) -> Option<io::Result<usize>> {
    // SAFETY: the GUID names WSASendMsg, whose signature matches SendMsgFn.
    let send_msg: SendMsgFn = unsafe { extension(socket, &WSAID_WSASENDMSG) }?;

    let mut control = ControlBuffer([0; 64]);
    let base = control.0.as_mut_ptr();
    // SAFETY: the control buffer is aligned and large enough for one header
    // followed by either packet-info structure.
    let used = unsafe {
        match *local {
            IpAddress::Invalid => 0,
            IpAddress::Ipv4(ip) => {
                let size = mem::size_of::<InPktinfo>();
                base.cast::<CmsgHdr>().write(CmsgHdr {
                    cmsg_len: cmsg_data_offset() + size,
                    cmsg_level: IPPROTO_IP,
                    cmsg_type: IP_PKTINFO,
                });
                let info = InPktinfo { ipi_addr: ip.octets(), ipi_ifindex: 0 };
                ptr::write_unaligned(base.add(cmsg_data_offset()).cast::<InPktinfo>(), info);
                cmsg_space(size)
            }
            IpAddress::Ipv6(ip) => {
                let size = mem::size_of::<In6Pktinfo>();
                base.cast::<CmsgHdr>().write(CmsgHdr {
                    cmsg_len: cmsg_data_offset() + size,
                    cmsg_level: IPPROTO_IPV6,
                    cmsg_type: IPV6_PKTINFO,
                });
                let info = In6Pktinfo { ipi6_addr: ip.octets(), ipi6_ifindex: 0 };
                ptr::write_unaligned(base.add(cmsg_data_offset()).cast::<In6Pktinfo>(), info);
                cmsg_space(size)
            }
        }
    };

    let mut data = WSABUF {
        len: buf.len() as u32,
        buf: buf.as_ptr() as *mut u8,
    };
    let msg = WSAMSG {
        name: remote.as_ptr() as *mut _,
        namelen: remote.len(),
        lpBuffers: &mut data,
        dwBufferCount: 1,
        Control: WSABUF {
            len: used as u32,
            buf: if used == 0 { ptr::null_mut() } else { base },
        },
        dwFlags: 0,
    };

    let mut sent = 0u32;
    // SAFETY: every pointer in `msg` refers to a local that outlives the call.
    let rc = unsafe {
        send_msg(raw(socket), &msg, 0, &mut sent, ptr::null_mut(), ptr::null_mut())
    };
    if rc != 0 {
        return Some(Err(last_error()));
    }
    Some(Ok(sent as usize))
}

pub(crate) fn recv_msg_to(
    socket: &Socket2,
    buf: &mut [u8],
) -> Option<io::Result<(usize, SockAddr, IpAddress)>> {
    // SAFETY: the GUID names WSARecvMsg, whose signature matches RecvMsgFn.
    let recv_msg: RecvMsgFn = unsafe { extension(socket, &WSAID_WSARECVMSG) }?;

    let mut control = ControlBuffer([0; 64]);
    let mut local = IpAddress::Invalid;

    // SAFETY: WSARecvMsg writes at most `*len` bytes of address into the
    // storage provided by SockAddr::try_init and reports the real length back.
    let received = unsafe {
        SockAddr::try_init(|storage, len| {
            let mut data = WSABUF {
                len: buf.len() as u32,
                buf: buf.as_mut_ptr(),
            };
            let mut msg = WSAMSG {
                name: storage.cast(),
                namelen: *len,
                lpBuffers: &mut data,
                dwBufferCount: 1,
                Control: WSABUF {
                    len: control.0.len() as u32,
                    buf: control.0.as_mut_ptr(),
                },
                dwFlags: 0,
            };
            let mut n = 0u32;
            let rc = recv_msg(raw(socket), &mut msg, &mut n, ptr::null_mut(), ptr::null_mut());
            if rc != 0 {
                return Err(last_error());
            }
            *len = msg.namelen;
            local = read_pktinfo(msg.Control.buf, msg.Control.len as usize);
            Ok(n as usize)
        })
    };

    Some(received.map(|(n, remote)| (n, remote, local)))
}

/// Walk the control messages and extract the destination address
unsafe fn read_pktinfo(base: *mut u8, len: usize) -> IpAddress {
    let mut local = IpAddress::Invalid;
    let mut offset = 0;
    while offset + mem::size_of::<CmsgHdr>() <= len {
        let header = ptr::read_unaligned(base.add(offset).cast::<CmsgHdr>());
        if header.cmsg_len < mem::size_of::<CmsgHdr>() {
            break;
        }
        let data = base.add(offset + cmsg_data_offset());
        if header.cmsg_level == IPPROTO_IP && header.cmsg_type == IP_PKTINFO {
            let info = ptr::read_unaligned(data.cast::<InPktinfo>());
            local = IpAddress::Ipv4(Ipv4Addr::from(info.ipi_addr));
        } else if header.cmsg_level == IPPROTO_IPV6 && header.cmsg_type == IPV6_PKTINFO {
            let info = ptr::read_unaligned(data.cast::<In6Pktinfo>());
            local = IpAddress::Ipv6(Ipv6Addr::from(info.ipi6_addr));
        }
        offset += cmsg_align(header.cmsg_len);
    }
    local
}
