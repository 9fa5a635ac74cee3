use crate::icmp::{EchoProtocol, Ttl};
use nix::libc;
use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::unix::io::AsRawFd;

// Room for a few control messages; we only look for the one carrying an int hop limit.
const CONTROL_BUFFER_SIZE: usize = 128;

/// Makes the kernel attach the TTL (IPv4) or hop limit (IPv6) to every received datagram.
pub(super) fn enable_ttl_reporting(
    socket: &socket2::Socket,
    protocol: EchoProtocol,
) -> io::Result<()> {
    let (level, name) = match protocol {
        EchoProtocol::EchoV4 => (libc::IPPROTO_IP, libc::IP_RECVTTL),
        EchoProtocol::EchoV6 => (libc::IPPROTO_IPV6, libc::IPV6_RECVHOPLIMIT),
    };
    let enable: libc::c_int = 1;
    #[allow(clippy::cast_possible_truncation)]
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            name,
            std::ptr::addr_of!(enable).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// `recvmsg` returning the sender and, when reported, the hop limit of the datagram.
pub(super) fn recv_with_ttl(
    socket: &socket2::Socket,
    buf: &mut [u8],
) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
    let mut name: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut control = [0u8; CONTROL_BUFFER_SIZE];
    let mut iov = libc::iovec { iov_base: buf.as_mut_ptr().cast(), iov_len: buf.len() };

    #[allow(clippy::cast_possible_truncation)]
    let name_len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_name = std::ptr::addr_of_mut!(name).cast();
    msg.msg_namelen = name_len;
    msg.msg_iov = std::ptr::addr_of_mut!(iov);
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = control.len() as _;

    let received = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, 0) };
    let n = usize::try_from(received).map_err(|_| io::Error::last_os_error())?;
    let source = source_addr(&name)?;
    // msg points at `control`, which recvmsg just filled in.
    let ttl = unsafe { reported_ttl(&msg) };
    Ok((n, source, ttl))
}

fn source_addr(name: &libc::sockaddr_storage) -> io::Result<IpAddr> {
    let family = libc::c_int::from(name.ss_family);
    let name: *const libc::sockaddr_storage = name;
    match family {
        libc::AF_INET => {
            let addr = unsafe { &*name.cast::<libc::sockaddr_in>() };
            Ok(IpAddr::V4(Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            let addr = unsafe { &*name.cast::<libc::sockaddr_in6>() };
            Ok(IpAddr::V6(Ipv6Addr::from(addr.sin6_addr.s6_addr)))
        }
        family => Err(io::Error::new(
            io::ErrorKind::Other,
            format!("received from unsupported address family {family}"),
        )),
    }
}

unsafe fn reported_ttl(msg: &libc::msghdr) -> Option<Ttl> {
    let mut cmsg = libc::CMSG_FIRSTHDR(msg);
    while !cmsg.is_null() {
        let header = &*cmsg;
        let ipv4_ttl = header.cmsg_level == libc::IPPROTO_IP && header.cmsg_type == libc::IP_TTL;
        let ipv6_hop_limit =
            header.cmsg_level == libc::IPPROTO_IPV6 && header.cmsg_type == libc::IPV6_HOPLIMIT;
        if ipv4_ttl || ipv6_hop_limit {
            let value = std::ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::c_int>());
            return u8::try_from(value).ok().map(Ttl);
        }
        cmsg = libc::CMSG_NXTHDR(msg, cmsg);
    }
    None
}
