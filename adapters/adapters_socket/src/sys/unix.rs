//! POSIX platform layer

use std::io;
use std::mem;

use nix::errno::Errno;
use socket2::Socket as Socket2;

use crate::error::{OsCondition, Operation};

pub(crate) const SOCKADDR_IN_LEN: usize = mem::size_of::<libc::sockaddr_in>();
pub(crate) const SOCKADDR_IN6_LEN: usize = mem::size_of::<libc::sockaddr_in6>();

/// Flags for plain sends; suppresses SIGPIPE where the flag exists
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) const SEND_FLAGS: libc::c_int = 0;

pub(crate) fn os_condition(_op: Operation, code: i32) -> Option<OsCondition> {
    let condition = match Errno::from_i32(code) {
        Errno::EAGAIN => OsCondition::WouldBlock,
        Errno::EINPROGRESS => OsCondition::InProgress,
        Errno::EADDRNOTAVAIL => OsCondition::AddressNotAvailable,
        Errno::EADDRINUSE => OsCondition::AddressInUse,
        Errno::EACCES => OsCondition::AccessDenied,
        Errno::ECONNREFUSED => OsCondition::ConnectionRefused,
        Errno::ECONNRESET => OsCondition::ConnectionReset,
        Errno::ETIMEDOUT => OsCondition::TimedOut,
        _ => return None,
    };
    Some(condition)
}

/// Sends on Linux pass MSG_NOSIGNAL; Apple platforms need the socket option.
pub(crate) fn prepare(socket: &Socket2) -> io::Result<()> {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    socket.set_nosigpipe(true)?;
    let _ = socket;
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use self::pktinfo::{enable_pktinfo, recv_msg_to, send_msg_from};

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) use self::no_pktinfo::{enable_pktinfo, recv_msg_to, send_msg_from};

/// Platforms without packet-info support in this layer degrade to plain datagram I/O
#[cfg(not(any(target_os = "linux", target_os = "android")))]
mod no_pktinfo {
    use std::io;

    use entities_net_address::{AddrFamily, IpAddress};
    use socket2::{SockAddr, Socket as Socket2};

    pub(crate) fn enable_pktinfo(_socket: &Socket2, _family: AddrFamily) -> bool {
        false
    }

    pub(crate) fn send_msg_from(
        _socket: &Socket2,
        _buf: &[u8],
        _remote: &SockAddr,
        _local: &IpAddress,
    ) -> Option<io::Result<usize>> {
        None
    }

    pub(crate) fn recv_msg_to(
        _socket: &Socket2,
        _buf: &mut [u8],
    ) -> Option<io::Result<(usize, SockAddr, IpAddress)>> {
        None
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod pktinfo {
    use std::io;
    use std::mem;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::os::unix::io::AsRawFd;
    use std::ptr;

    use entities_net_address::{AddrFamily, IpAddress};
    use socket2::{SockAddr, Socket as Socket2};

    /// Control buffer large enough for one IPv4 or IPv6 packet-info message
    #[repr(C, align(8))]
    struct ControlBuffer([u8; 64]);

    impl ControlBuffer {
        fn new() -> Self {
            Self([0; 64])
        }
    }

    pub(crate) fn enable_pktinfo(socket: &Socket2, family: AddrFamily) -> bool {
        let (level, name) = match family {
            AddrFamily::Ipv4 => (libc::IPPROTO_IP, libc::IP_PKTINFO),
            AddrFamily::Ipv6 => (libc::IPPROTO_IPV6, libc::IPV6_RECVPKTINFO),
        };
        let on: libc::c_int = 1;
        // SAFETY: `on` outlives the call and its size is passed alongside.
        let rc = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                level,
                name,
                (&on as *const libc::c_int).cast(),
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        rc == 0
    }

    pub(crate) fn send_msg_from(
        socket: &Socket2,
        buf: &[u8],
        remote: &SockAddr,
        local: &IpAddress,
    ) -> Option<io::Result<usize>> {
        let mut iov = libc::iovec {
            iov_base: buf.as_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        let mut control = ControlBuffer::new();

        // SAFETY: msghdr is plain data; every pointer stored in it refers to a
        // local that outlives the sendmsg call.
        let sent = unsafe {
            let mut msg: libc::msghdr = mem::zeroed();
            msg.msg_name = remote.as_ptr() as *mut libc::c_void;
            msg.msg_namelen = remote.len();
            msg.msg_iov = &mut iov;
            msg.msg_iovlen = 1;
            msg.msg_control = control.0.as_mut_ptr().cast();
            msg.msg_controllen = control.0.len() as _;

            let used = write_pktinfo(&mut msg, local);
            if used == 0 {
                msg.msg_control = ptr::null_mut();
            }
            msg.msg_controllen = used as _;

            libc::sendmsg(socket.as_raw_fd(), &msg, libc::MSG_NOSIGNAL)
        };

        if sent < 0 {
            return Some(Err(io::Error::last_os_error()));
        }
        Some(Ok(sent as usize))
    }

    /// Write the source-address control message, returning the bytes used
    unsafe fn write_pktinfo(msg: &mut libc::msghdr, local: &IpAddress) -> usize {
        let cmsg = libc::CMSG_FIRSTHDR(msg);
        match *local {
            IpAddress::Invalid => 0,
            IpAddress::Ipv4(ip) => {
                let size = mem::size_of::<libc::in_pktinfo>() as libc::c_uint;
                (*cmsg).cmsg_level = libc::IPPROTO_IP;
                (*cmsg).cmsg_type = libc::IP_PKTINFO;
                (*cmsg).cmsg_len = libc::CMSG_LEN(size) as _;
                let info = libc::in_pktinfo {
                    ipi_ifindex: 0,
                    ipi_spec_dst: libc::in_addr {
                        s_addr: u32::from_ne_bytes(ip.octets()),
                    },
                    ipi_addr: libc::in_addr { s_addr: 0 },
                };
                ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::in_pktinfo>(), info);
                libc::CMSG_SPACE(size) as usize
            }
            IpAddress::Ipv6(ip) => {
                let size = mem::size_of::<libc::in6_pktinfo>() as libc::c_uint;
                (*cmsg).cmsg_level = libc::IPPROTO_IPV6;
                (*cmsg).cmsg_type = libc::IPV6_PKTINFO;
                (*cmsg).cmsg_len = libc::CMSG_LEN(size) as _;
                let info = libc::in6_pktinfo {
                    ipi6_addr: libc::in6_addr { s6_addr: ip.octets() },
                    ipi6_ifindex: 0,
                };
                ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::in6_pktinfo>(), info);
                libc::CMSG_SPACE(size) as usize
            }
        }
    }

    pub(crate) fn recv_msg_to(
        socket: &Socket2,
        buf: &mut [u8],
    ) -> Option<io::Result<(usize, SockAddr, IpAddress)>> {
        let mut control = ControlBuffer::new();
        let mut local = IpAddress::Invalid;

        // SAFETY: recvmsg writes at most `*len` bytes of address into the
        // storage provided by SockAddr::try_init and reports the real length
        // back through `msg_namelen`.
        let received = unsafe {
            SockAddr::try_init(|storage, len| {
                let mut iov = libc::iovec {
                    iov_base: buf.as_mut_ptr().cast(),
                    iov_len: buf.len(),
                };
                let mut msg: libc::msghdr = mem::zeroed();
                msg.msg_name = storage.cast();
                msg.msg_namelen = *len;
                msg.msg_iov = &mut iov;
                msg.msg_iovlen = 1;
                msg.msg_control = control.0.as_mut_ptr().cast();
                msg.msg_controllen = control.0.len() as _;

                let n = libc::recvmsg(socket.as_raw_fd(), &mut msg, 0);
                if n < 0 {
                    return Err(io::Error::last_os_error());
                }
                *len = msg.msg_namelen;
                local = read_pktinfo(&msg);
                Ok(n as usize)
            })
        };

        Some(received.map(|(n, remote)| (n, remote, local)))
    }

    /// Extract the destination address from the control messages
    unsafe fn read_pktinfo(msg: &libc::msghdr) -> IpAddress {
        let mut local = IpAddress::Invalid;
        let mut cmsg = libc::CMSG_FIRSTHDR(msg);
        while !cmsg.is_null() {
            let (level, kind) = ((*cmsg).cmsg_level, (*cmsg).cmsg_type);
            if level == libc::IPPROTO_IP && kind == libc::IP_PKTINFO {
                let info = ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::in_pktinfo>());
                local = IpAddress::Ipv4(Ipv4Addr::from(info.ipi_addr.s_addr.to_ne_bytes()));
            } else if level == libc::IPPROTO_IPV6 && kind == libc::IPV6_PKTINFO {
                let info = ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::in6_pktinfo>());
                local = IpAddress::Ipv6(Ipv6Addr::from(info.ipi6_addr.s6_addr));
            }
            cmsg = libc::CMSG_NXTHDR(msg, cmsg);
        }
        local
    }
}
